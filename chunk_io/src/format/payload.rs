//! Chunk and scene container read/write implementation.
//!
//! Both file kinds share one little-endian section layout and differ only
//! in magic and allowed flags. Train chunks store just the model-facing
//! arrays; eval chunks additionally persist their provenance so a scene can
//! be reassembled later.
//!
//! # Format Specification
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ HEADER (16 bytes)                                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  0-3:   Magic "PCCK" (chunk) or "PCSC" (scene)           │
//! │  4-5:   version (u16 LE)                                 │
//! │  6-7:   flags (u16 LE)                                   │
//! │  8-11:  count (u32 LE)                                   │
//! │ 12-15:  reserved (4 bytes)                               │
//! ├──────────────────────────────────────────────────────────┤
//! │ POINTS: count × (f32 x, f32 y, f32 z) LE                 │
//! │ LABELS (iff FLAG_LABELS): count × i32 LE                 │
//! │ COLORS: count × (u8 r, u8 g, u8 b)                       │
//! │ NORMALS: count × (f32 x, f32 y, f32 z) LE                │
//! │ WEIGHTS: count × f32 LE (chunk files only)               │
//! ├──────────────────────────────────────────────────────────┤
//! │ PROVENANCE (iff FLAG_PROVENANCE, chunk files only)       │
//! │  name_len (u32 LE), name (UTF-8 bytes)                   │
//! │  VALID MASK: count × u8 (0 or 1)                         │
//! │  ORIGIN INDEX: count × u32 LE                            │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::io::{Read, Write};

use chunk_core::{Chunk, Point3, Provenance, Scene, SceneChunk};

use super::header::{
    FileHeader, CHUNK_MAGIC, FLAG_LABELS, FLAG_PROVENANCE, FORMAT_VERSION, HEADER_SIZE,
    SCENE_MAGIC,
};
use crate::error::{ChunkIoError, Result};

/// Upper bound on the header point count; caps allocation for corrupt files.
const MAX_COUNT: u32 = 128 << 20;

/// Upper bound on the stored scene name length in bytes.
const MAX_NAME_LEN: u32 = 1024;

/// Write a train-schema chunk (arrays only, no provenance).
pub fn save_chunk<W: Write>(chunk: &Chunk, writer: &mut W) -> Result<()> {
    let mut flags = 0;
    if chunk.labels.is_some() {
        flags |= FLAG_LABELS;
    }
    let header = FileHeader::new(CHUNK_MAGIC, flags, chunk.k() as u32);
    writer.write_all(&header.to_bytes())?;
    write_chunk_sections(chunk, writer)
}

/// Write an eval-schema chunk including its provenance section.
pub fn save_scene_chunk<W: Write>(sc: &SceneChunk, writer: &mut W) -> Result<()> {
    let mut flags = FLAG_PROVENANCE;
    if sc.chunk.labels.is_some() {
        flags |= FLAG_LABELS;
    }
    let header = FileHeader::new(CHUNK_MAGIC, flags, sc.k() as u32);
    writer.write_all(&header.to_bytes())?;
    write_chunk_sections(&sc.chunk, writer)?;

    let name = sc.provenance.scene.as_bytes();
    writer.write_all(&(name.len() as u32).to_le_bytes())?;
    writer.write_all(name)?;
    write_mask(&sc.provenance.valid_mask, writer)?;
    write_u32s(&sc.provenance.origin_index, writer)?;
    Ok(())
}

/// Read a train-schema chunk.
///
/// # Errors
/// Returns `InvalidFormat` on bad magic, version or flag mismatch, and on
/// trailing bytes after the payload.
pub fn load_chunk<R: Read>(reader: &mut R) -> Result<Chunk> {
    let header = read_header(reader, CHUNK_MAGIC)?;
    if header.has_flag(FLAG_PROVENANCE) {
        return Err(ChunkIoError::InvalidFormat {
            detail: "unexpected provenance section in train chunk".to_string(),
        });
    }
    let chunk = read_chunk_sections(reader, &header)?;
    expect_eof(reader)?;
    Ok(chunk)
}

/// Read an eval-schema chunk including its provenance.
pub fn load_scene_chunk<R: Read>(reader: &mut R) -> Result<SceneChunk> {
    let header = read_header(reader, CHUNK_MAGIC)?;
    if !header.has_flag(FLAG_PROVENANCE) {
        return Err(ChunkIoError::InvalidFormat {
            detail: "missing provenance section".to_string(),
        });
    }
    let chunk = read_chunk_sections(reader, &header)?;
    let count = header.count as usize;

    let name_len = read_u32(reader)?;
    if name_len > MAX_NAME_LEN {
        return Err(ChunkIoError::InvalidFormat {
            detail: format!("scene name length {} exceeds limit", name_len),
        });
    }
    let mut name_bytes = vec![0u8; name_len as usize];
    reader.read_exact(&mut name_bytes)?;
    let name = String::from_utf8(name_bytes).map_err(|_| ChunkIoError::InvalidFormat {
        detail: "scene name is not valid UTF-8".to_string(),
    })?;

    let valid_mask = read_mask(reader, count)?;
    let origin_index = read_u32s(reader, count)?;
    expect_eof(reader)?;

    Ok(SceneChunk::new(
        chunk,
        Provenance::new(name, origin_index, valid_mask),
    ))
}

/// Write a full scene. The scene name is carried by the file stem, not the
/// payload.
pub fn save_scene<W: Write>(scene: &Scene, writer: &mut W) -> Result<()> {
    let mut flags = 0;
    if scene.labels.is_some() {
        flags |= FLAG_LABELS;
    }
    let header = FileHeader::new(SCENE_MAGIC, flags, scene.len() as u32);
    writer.write_all(&header.to_bytes())?;

    write_points(&scene.points, writer)?;
    if let Some(labels) = &scene.labels {
        write_i32s(labels, writer)?;
    }
    write_colors(&scene.colors, writer)?;
    write_points(&scene.normals, writer)?;
    Ok(())
}

/// Read a full scene, naming it after the given file stem.
pub fn load_scene<R: Read>(reader: &mut R, name: &str) -> Result<Scene> {
    let header = read_header(reader, SCENE_MAGIC)?;
    if header.has_flag(FLAG_PROVENANCE) {
        return Err(ChunkIoError::InvalidFormat {
            detail: "unexpected provenance section in scene file".to_string(),
        });
    }
    let count = header.count as usize;

    let points = read_points(reader, count)?;
    let labels = if header.has_flag(FLAG_LABELS) {
        Some(read_i32s(reader, count)?)
    } else {
        None
    };
    let colors = read_colors(reader, count)?;
    let normals = read_points(reader, count)?;
    expect_eof(reader)?;

    Ok(match labels {
        Some(labels) => Scene::with_labels(name, points, colors, normals, labels),
        None => Scene::new(name, points, colors, normals),
    })
}

fn read_header<R: Read>(reader: &mut R, expected_magic: [u8; 4]) -> Result<FileHeader> {
    let mut bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut bytes)?;
    let header = FileHeader::from_bytes(&bytes);

    if header.magic != expected_magic {
        return Err(ChunkIoError::InvalidFormat {
            detail: format!("bad magic {:?} (expected {:?})", header.magic, expected_magic),
        });
    }
    if header.version != FORMAT_VERSION {
        return Err(ChunkIoError::InvalidFormat {
            detail: format!("unsupported format version {}", header.version),
        });
    }
    if header.count > MAX_COUNT {
        return Err(ChunkIoError::InvalidFormat {
            detail: format!("point count {} exceeds limit", header.count),
        });
    }
    Ok(header)
}

fn write_chunk_sections<W: Write>(chunk: &Chunk, writer: &mut W) -> Result<()> {
    write_points(&chunk.points, writer)?;
    if let Some(labels) = &chunk.labels {
        write_i32s(labels, writer)?;
    }
    write_colors(&chunk.colors, writer)?;
    write_points(&chunk.normals, writer)?;
    write_f32s(&chunk.sample_weight, writer)?;
    Ok(())
}

fn read_chunk_sections<R: Read>(reader: &mut R, header: &FileHeader) -> Result<Chunk> {
    let count = header.count as usize;

    let points = read_points(reader, count)?;
    let labels = if header.has_flag(FLAG_LABELS) {
        Some(read_i32s(reader, count)?)
    } else {
        None
    };
    let colors = read_colors(reader, count)?;
    let normals = read_points(reader, count)?;
    let sample_weight = read_f32s(reader, count)?;

    Ok(match labels {
        Some(labels) => Chunk::with_labels(points, colors, normals, labels, sample_weight),
        None => Chunk::new(points, colors, normals, sample_weight),
    })
}

fn write_points<W: Write>(points: &[Point3], writer: &mut W) -> Result<()> {
    for p in points {
        writer.write_all(&p.x.to_le_bytes())?;
        writer.write_all(&p.y.to_le_bytes())?;
        writer.write_all(&p.z.to_le_bytes())?;
    }
    Ok(())
}

fn read_points<R: Read>(reader: &mut R, count: usize) -> Result<Vec<Point3>> {
    let mut bytes = vec![0u8; count * 12];
    reader.read_exact(&mut bytes)?;

    let mut points = Vec::with_capacity(count);
    for c in bytes.chunks_exact(12) {
        points.push(Point3::new(
            f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
            f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
            f32::from_le_bytes([c[8], c[9], c[10], c[11]]),
        ));
    }
    Ok(points)
}

fn write_colors<W: Write>(colors: &[[u8; 3]], writer: &mut W) -> Result<()> {
    for c in colors {
        writer.write_all(c)?;
    }
    Ok(())
}

fn read_colors<R: Read>(reader: &mut R, count: usize) -> Result<Vec<[u8; 3]>> {
    let mut bytes = vec![0u8; count * 3];
    reader.read_exact(&mut bytes)?;

    Ok(bytes
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect())
}

fn write_f32s<W: Write>(values: &[f32], writer: &mut W) -> Result<()> {
    for v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn read_f32s<R: Read>(reader: &mut R, count: usize) -> Result<Vec<f32>> {
    let mut bytes = vec![0u8; count * 4];
    reader.read_exact(&mut bytes)?;

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn write_i32s<W: Write>(values: &[i32], writer: &mut W) -> Result<()> {
    for v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn read_i32s<R: Read>(reader: &mut R, count: usize) -> Result<Vec<i32>> {
    let mut bytes = vec![0u8; count * 4];
    reader.read_exact(&mut bytes)?;

    Ok(bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn write_u32s<W: Write>(values: &[u32], writer: &mut W) -> Result<()> {
    for v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn read_u32s<R: Read>(reader: &mut R, count: usize) -> Result<Vec<u32>> {
    let mut bytes = vec![0u8; count * 4];
    reader.read_exact(&mut bytes)?;

    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn write_mask<W: Write>(mask: &[bool], writer: &mut W) -> Result<()> {
    for m in mask {
        writer.write_all(&[u8::from(*m)])?;
    }
    Ok(())
}

fn read_mask<R: Read>(reader: &mut R, count: usize) -> Result<Vec<bool>> {
    let mut bytes = vec![0u8; count];
    reader.read_exact(&mut bytes)?;

    let mut mask = Vec::with_capacity(count);
    for b in bytes {
        match b {
            0 => mask.push(false),
            1 => mask.push(true),
            other => {
                return Err(ChunkIoError::InvalidFormat {
                    detail: format!("invalid mask byte {}", other),
                })
            }
        }
    }
    Ok(mask)
}

fn expect_eof<R: Read>(reader: &mut R) -> Result<()> {
    let mut probe = [0u8; 1];
    if reader.read(&mut probe)? != 0 {
        return Err(ChunkIoError::InvalidFormat {
            detail: "trailing bytes after payload".to_string(),
        });
    }
    Ok(())
}
