//! Tagged-chunk container I/O.
//!
//! A chunk is a 4-byte ASCII tag, a little-endian `u32` element count, then
//! `count` fixed-size records. Walk-mesh resources are a fixed sequence of
//! such chunks; see [`crate::walkmeshes`] for the tags and their order.

use std::io::{Read, Write};

use anyhow::{Context, Result, bail};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use walkmesh::{UVec3, Vec3, uvec3, vec3};

fn tag_str(tag: &[u8; 4]) -> String {
    String::from_utf8_lossy(tag).into_owned()
}

/// Read a chunk header, check its tag, and return the element count.
pub fn read_header<R: Read>(reader: &mut R, tag: &[u8; 4]) -> Result<usize> {
    let mut found = [0u8; 4];
    reader
        .read_exact(&mut found)
        .with_context(|| format!("Failed to read '{}' chunk tag", tag_str(tag)))?;
    if &found != tag {
        bail!(
            "Expected chunk '{}', found '{}'",
            tag_str(tag),
            tag_str(&found)
        );
    }
    let count = reader
        .read_u32::<LittleEndian>()
        .with_context(|| format!("Failed to read '{}' chunk count", tag_str(tag)))?;
    Ok(count as usize)
}

/// Read a chunk of 3-float records.
pub fn read_vec3s<R: Read>(reader: &mut R, tag: &[u8; 4]) -> Result<Vec<Vec3>> {
    let count = read_header(reader, tag)?;
    let mut out = Vec::with_capacity(count);
    for record in 0..count {
        let mut values = [0.0f32; 3];
        for value in &mut values {
            *value = reader.read_f32::<LittleEndian>().with_context(|| {
                format!("Truncated '{}' chunk at record {}", tag_str(tag), record)
            })?;
        }
        out.push(vec3(values[0], values[1], values[2]));
    }
    Ok(out)
}

/// Read a chunk of 3-u32 index records.
pub fn read_uvec3s<R: Read>(reader: &mut R, tag: &[u8; 4]) -> Result<Vec<UVec3>> {
    let count = read_header(reader, tag)?;
    let mut out = Vec::with_capacity(count);
    for record in 0..count {
        let mut values = [0u32; 3];
        for value in &mut values {
            *value = reader.read_u32::<LittleEndian>().with_context(|| {
                format!("Truncated '{}' chunk at record {}", tag_str(tag), record)
            })?;
        }
        out.push(uvec3(values[0], values[1], values[2]));
    }
    Ok(out)
}

/// Read a raw byte chunk.
pub fn read_bytes<R: Read>(reader: &mut R, tag: &[u8; 4]) -> Result<Vec<u8>> {
    let count = read_header(reader, tag)?;
    let mut out = vec![0u8; count];
    reader
        .read_exact(&mut out)
        .with_context(|| format!("Truncated '{}' chunk", tag_str(tag)))?;
    Ok(out)
}

/// Write a chunk header (tag + element count).
pub fn write_header<W: Write>(writer: &mut W, tag: &[u8; 4], count: usize) -> Result<()> {
    let count = u32::try_from(count)
        .with_context(|| format!("Chunk '{}' has too many records", tag_str(tag)))?;
    writer.write_all(tag)?;
    writer.write_u32::<LittleEndian>(count)?;
    Ok(())
}

pub fn write_vec3s<W: Write>(writer: &mut W, tag: &[u8; 4], records: &[Vec3]) -> Result<()> {
    write_header(writer, tag, records.len())?;
    for v in records {
        writer.write_f32::<LittleEndian>(v.x)?;
        writer.write_f32::<LittleEndian>(v.y)?;
        writer.write_f32::<LittleEndian>(v.z)?;
    }
    Ok(())
}

pub fn write_uvec3s<W: Write>(writer: &mut W, tag: &[u8; 4], records: &[UVec3]) -> Result<()> {
    write_header(writer, tag, records.len())?;
    for v in records {
        writer.write_u32::<LittleEndian>(v.x)?;
        writer.write_u32::<LittleEndian>(v.y)?;
        writer.write_u32::<LittleEndian>(v.z)?;
    }
    Ok(())
}

pub fn write_bytes<W: Write>(writer: &mut W, tag: &[u8; 4], bytes: &[u8]) -> Result<()> {
    write_header(writer, tag, bytes.len())?;
    writer.write_all(bytes)?;
    Ok(())
}
