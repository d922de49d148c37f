//! Packet framing for the Minecraft Server List Ping exchange.
//!
//! Every packet is `VarInt length | VarInt packet id | payload`, where the
//! length covers the id and the payload.

use crate::error::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Protocol version sent in the handshake; -1 asks the server to answer
/// whatever version it runs.
const ANY_PROTOCOL: i32 = -1;
/// Handshake "next state" value selecting the status exchange.
const NEXT_STATE_STATUS: i32 = 1;
/// Upper bound for an incoming packet; status replies are a few KiB.
const MAX_PACKET_LEN: usize = 1 << 21;

pub const HANDSHAKE_ID: i32 = 0x00;
pub const STATUS_REQUEST_ID: i32 = 0x00;
pub const STATUS_RESPONSE_ID: i32 = 0x00;

/// Append `value` as a VarInt (7 bits per byte, little-endian groups).
pub fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
}

/// Decode a VarInt from the start of `bytes`, returning it and its length.
pub fn read_varint(bytes: &[u8]) -> Result<(i32, usize)> {
    let mut value: u32 = 0;
    for (i, byte) in bytes.iter().take(5).enumerate() {
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value as i32, i + 1));
        }
    }
    if bytes.len() < 5 {
        Err(Error::Protocol("Truncated VarInt".to_string()))
    } else {
        Err(Error::Protocol("VarInt is longer than 5 bytes".to_string()))
    }
}

async fn read_varint_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = reader
            .read_u8()
            .await
            .map_err(|e| Error::Protocol(format!("Failed to read VarInt: {}", e)))?;
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(Error::Protocol("VarInt is longer than 5 bytes".to_string()))
}

pub fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

/// Decode a length-prefixed UTF-8 string from the start of `bytes`.
pub fn read_string(bytes: &[u8]) -> Result<String> {
    let (len, offset) = read_varint(bytes)?;
    let len = usize::try_from(len)
        .map_err(|_| Error::Protocol(format!("Negative string length {}", len)))?;
    let data = bytes
        .get(offset..offset + len)
        .ok_or_else(|| Error::Protocol("Truncated string".to_string()))?;
    String::from_utf8(data.to_vec())
        .map_err(|e| Error::Protocol(format!("String is not UTF-8: {}", e)))
}

/// Wrap `payload` into a length-prefixed packet.
pub fn frame(packet_id: i32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 5);
    write_varint(&mut body, packet_id);
    body.extend_from_slice(payload);

    let mut packet = Vec::with_capacity(body.len() + 5);
    write_varint(&mut packet, body.len() as i32);
    packet.extend_from_slice(&body);
    packet
}

pub fn handshake_packet(host: &str, port: u16) -> Vec<u8> {
    let mut payload = Vec::new();
    write_varint(&mut payload, ANY_PROTOCOL);
    write_string(&mut payload, host);
    payload.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut payload, NEXT_STATE_STATUS);
    frame(HANDSHAKE_ID, &payload)
}

pub fn status_request_packet() -> Vec<u8> {
    frame(STATUS_REQUEST_ID, &[])
}

/// Read one packet, returning its id and payload.
pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<(i32, Vec<u8>)> {
    let len = read_varint_from(reader).await?;
    let len = usize::try_from(len)
        .ok()
        .filter(|len| (1..=MAX_PACKET_LEN).contains(len))
        .ok_or_else(|| Error::Protocol(format!("Invalid packet length {}", len)))?;

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| Error::Protocol(format!("Failed to read packet: {}", e)))?;

    let (id, offset) = read_varint(&body)?;
    Ok((id, body.split_off(offset)))
}
