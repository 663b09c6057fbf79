//! Named walk-mesh collections loaded from a chunked resource.
//!
//! One resource file carries shared position/normal/triangle/name buffers
//! plus an index of named sub-meshes, each a half-open slice of those
//! buffers. Loading validates every range, remaps triangle indices to the
//! sub-mesh-local 0-based range, and builds one [`WalkMesh`] per entry.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow, ensure};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use walkmesh::{UVec3, Vec3, WalkMesh, uvec3};

use crate::chunk;

/// Chunk tags, in file order.
pub const TAG_POSITIONS: &[u8; 4] = b"p...";
pub const TAG_NORMALS: &[u8; 4] = b"n...";
pub const TAG_TRIANGLES: &[u8; 4] = b"tri0";
pub const TAG_NAMES: &[u8; 4] = b"str0";
pub const TAG_INDEX: &[u8; 4] = b"idxA";

/// One named sub-mesh: half-open ranges into the shared buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexEntry {
    pub name_begin: u32,
    pub name_end: u32,
    pub vertex_begin: u32,
    pub vertex_end: u32,
    pub triangle_begin: u32,
    pub triangle_end: u32,
}

/// Read-only collection of named walk meshes from one resource.
#[derive(Debug)]
pub struct WalkMeshes {
    meshes: HashMap<String, WalkMesh>,
}

impl WalkMeshes {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open walk mesh file: {}", path.display()))?;
        Self::load_from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to load walk meshes from {}", path.display()))
    }

    pub fn load_from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let positions = chunk::read_vec3s(&mut reader, TAG_POSITIONS)?;
        let normals = chunk::read_vec3s(&mut reader, TAG_NORMALS)?;
        let triangles = chunk::read_uvec3s(&mut reader, TAG_TRIANGLES)?;
        let names = chunk::read_bytes(&mut reader, TAG_NAMES)?;
        let index = read_index_entries(&mut reader)?;

        if reader.read(&mut [0u8; 1])? != 0 {
            log::warn!("Trailing data after the 'idxA' chunk in walk mesh resource");
        }

        ensure!(
            positions.len() == normals.len(),
            "Mismatched position ({}) and normal ({}) counts",
            positions.len(),
            normals.len()
        );

        let mut meshes = HashMap::with_capacity(index.len());
        for (i, entry) in index.iter().enumerate() {
            ensure!(
                entry.name_begin <= entry.name_end && entry.name_end as usize <= names.len(),
                "Entry {i}: name range {}..{} out of bounds ({} name bytes)",
                entry.name_begin,
                entry.name_end,
                names.len()
            );
            ensure!(
                entry.vertex_begin <= entry.vertex_end
                    && entry.vertex_end as usize <= positions.len(),
                "Entry {i}: vertex range {}..{} out of bounds ({} vertices)",
                entry.vertex_begin,
                entry.vertex_end,
                positions.len()
            );
            ensure!(
                entry.triangle_begin <= entry.triangle_end
                    && entry.triangle_end as usize <= triangles.len(),
                "Entry {i}: triangle range {}..{} out of bounds ({} triangles)",
                entry.triangle_begin,
                entry.triangle_end,
                triangles.len()
            );
            for (j, other) in index[..i].iter().enumerate() {
                ensure!(
                    !ranges_overlap(
                        (entry.vertex_begin, entry.vertex_end),
                        (other.vertex_begin, other.vertex_end)
                    ),
                    "Entry {i}: vertex range overlaps entry {j}"
                );
                ensure!(
                    !ranges_overlap(
                        (entry.triangle_begin, entry.triangle_end),
                        (other.triangle_begin, other.triangle_end)
                    ),
                    "Entry {i}: triangle range overlaps entry {j}"
                );
            }

            let name = std::str::from_utf8(
                &names[entry.name_begin as usize..entry.name_end as usize],
            )
            .with_context(|| format!("Entry {i}: name is not valid UTF-8"))?
            .to_owned();

            let local_vertices =
                positions[entry.vertex_begin as usize..entry.vertex_end as usize].to_vec();
            let local_normals =
                normals[entry.vertex_begin as usize..entry.vertex_end as usize].to_vec();

            // a sub-mesh may only reference its own vertex range
            let mut local_triangles =
                Vec::with_capacity((entry.triangle_end - entry.triangle_begin) as usize);
            for ti in entry.triangle_begin..entry.triangle_end {
                let tri = triangles[ti as usize];
                for index in [tri.x, tri.y, tri.z] {
                    ensure!(
                        entry.vertex_begin <= index && index < entry.vertex_end,
                        "Triangle {ti} of '{name}' references vertex {index} outside {}..{}",
                        entry.vertex_begin,
                        entry.vertex_end
                    );
                }
                local_triangles.push(uvec3(
                    tri.x - entry.vertex_begin,
                    tri.y - entry.vertex_begin,
                    tri.z - entry.vertex_begin,
                ));
            }

            let mesh = WalkMesh::new(local_vertices, local_normals, local_triangles)
                .with_context(|| format!("Invalid walk mesh '{name}'"))?;
            ensure!(
                meshes.insert(name.clone(), mesh).is_none(),
                "Duplicate walk mesh name '{name}'"
            );
        }

        log::info!(
            "Loaded {} walk meshes ({} vertices, {} triangles)",
            meshes.len(),
            positions.len(),
            triangles.len()
        );
        Ok(Self { meshes })
    }

    /// Fetch a mesh by name; absent names are an error, never a default.
    pub fn lookup(&self, name: &str) -> Result<&WalkMesh> {
        self.meshes
            .get(name)
            .ok_or_else(|| anyhow!("Walk mesh '{name}' not found"))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.meshes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

fn ranges_overlap(a: (u32, u32), b: (u32, u32)) -> bool {
    a.0 < a.1 && b.0 < b.1 && a.0 < b.1 && b.0 < a.1
}

fn read_index_entries<R: Read>(reader: &mut R) -> Result<Vec<IndexEntry>> {
    let count = chunk::read_header(reader, TAG_INDEX)?;
    let mut out = Vec::with_capacity(count);
    for record in 0..count {
        let mut values = [0u32; 6];
        for value in &mut values {
            *value = reader
                .read_u32::<LittleEndian>()
                .with_context(|| format!("Truncated 'idxA' chunk at record {record}"))?;
        }
        out.push(IndexEntry {
            name_begin: values[0],
            name_end: values[1],
            vertex_begin: values[2],
            vertex_end: values[3],
            triangle_begin: values[4],
            triangle_end: values[5],
        });
    }
    Ok(out)
}

fn write_index_entries<W: Write>(writer: &mut W, entries: &[IndexEntry]) -> Result<()> {
    chunk::write_header(writer, TAG_INDEX, entries.len())?;
    for e in entries {
        for value in [
            e.name_begin,
            e.name_end,
            e.vertex_begin,
            e.vertex_end,
            e.triangle_begin,
            e.triangle_end,
        ] {
            writer.write_u32::<LittleEndian>(value)?;
        }
    }
    Ok(())
}

/// Pack walk-mesh buffers into the chunked resource layout; the inverse of
/// [`WalkMeshes::load_from_reader`]. Used by tests and offline tooling.
pub fn write_resource<W: Write>(
    writer: &mut W,
    positions: &[Vec3],
    normals: &[Vec3],
    triangles: &[UVec3],
    names: &[u8],
    index: &[IndexEntry],
) -> Result<()> {
    chunk::write_vec3s(writer, TAG_POSITIONS, positions)?;
    chunk::write_vec3s(writer, TAG_NORMALS, normals)?;
    chunk::write_uvec3s(writer, TAG_TRIANGLES, triangles)?;
    chunk::write_bytes(writer, TAG_NAMES, names)?;
    write_index_entries(writer, index)?;
    Ok(())
}
