//! Reader for EPOCH's SDF ("Self-Describing Format") snapshot files.
//!
//! An SDF file is a fixed header followed by a linked list of blocks. Each
//! block starts with a common header (next block offset, data offset, id,
//! type, name), then type-specific metadata at
//! `block_start + block_header_length`, and its payload at an absolute data
//! offset. Only the block types needed for particle and grid analysis are
//! decoded; everything else is skipped.

use crate::error::{AnalysisError, AnalysisResult};
use crate::snapshot::{Block, BlockData, Snapshot};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use log::{debug, trace};
use std::io::{Cursor, ErrorKind, Read, Seek, SeekFrom};
use std::marker::PhantomData;

pub const SDF_MAGIC: &[u8; 4] = b"SDF1";
/// Written in the producer's native byte order; tells us how to read the rest.
pub const ENDIANNESS_MARKER: i32 = 0x0f0e_0201;
pub const SDF_VERSION: i32 = 1;
/// Length of block ids, labels and unit strings.
pub const ID_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    PlainMesh,
    PointMesh,
    PlainVariable,
    PointVariable,
    Constant,
    Other(i32),
}

impl BlockType {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => BlockType::PlainMesh,
            2 => BlockType::PointMesh,
            3 => BlockType::PlainVariable,
            4 => BlockType::PointVariable,
            5 => BlockType::Constant,
            other => BlockType::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            BlockType::PlainMesh => 1,
            BlockType::PointMesh => 2,
            BlockType::PlainVariable => 3,
            BlockType::PointVariable => 4,
            BlockType::Constant => 5,
            BlockType::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int32,
    Int64,
    Real32,
    Real64,
    Other(i32),
}

impl DataType {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => DataType::Int32,
            2 => DataType::Int64,
            3 => DataType::Real32,
            4 => DataType::Real64,
            other => DataType::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            DataType::Int32 => 1,
            DataType::Int64 => 2,
            DataType::Real32 => 3,
            DataType::Real64 => 4,
            DataType::Other(code) => code,
        }
    }

    /// Size in bytes of one element, for the numeric types we decode.
    pub fn size(self) -> Option<usize> {
        match self {
            DataType::Int32 | DataType::Real32 => Some(4),
            DataType::Int64 | DataType::Real64 => Some(8),
            DataType::Other(_) => None,
        }
    }
}

/// File-level header.
#[derive(Debug, Clone)]
pub struct SdfHeader {
    pub version: i32,
    pub revision: i32,
    pub code_name: String,
    pub first_block_location: u64,
    pub nblocks: i32,
    pub block_header_length: i32,
    pub step: i32,
    pub time: f64,
    pub string_length: i32,
    pub code_io_version: i32,
    pub restart_flag: bool,
    pub other_domains: bool,
}

/// Common header at the start of every block.
#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub block_start: u64,
    pub next_block_location: u64,
    pub data_location: u64,
    pub id: String,
    pub data_length: u64,
    pub block_type: BlockType,
    pub data_type: DataType,
    pub ndims: usize,
    pub name: String,
}

/// Decodes an in-memory SDF file into a [`Snapshot`].
pub fn parse(bytes: &[u8]) -> AnalysisResult<Snapshot> {
    if bytes.len() < 8 || &bytes[0..4] != SDF_MAGIC {
        return Err(AnalysisError::Format("missing SDF1 magic".to_string()));
    }
    if LittleEndian::read_i32(&bytes[4..8]) == ENDIANNESS_MARKER {
        SdfReader::<LittleEndian>::new(bytes).read_snapshot()
    } else if BigEndian::read_i32(&bytes[4..8]) == ENDIANNESS_MARKER {
        SdfReader::<BigEndian>::new(bytes).read_snapshot()
    } else {
        Err(AnalysisError::Format(format!(
            "unrecognised endianness marker {:#010x}",
            LittleEndian::read_i32(&bytes[4..8])
        )))
    }
}

fn truncated(e: std::io::Error) -> AnalysisError {
    if e.kind() == ErrorKind::UnexpectedEof {
        AnalysisError::Format("unexpected end of file".to_string())
    } else {
        AnalysisError::Io(e)
    }
}

fn non_negative(value: i64, what: &str) -> AnalysisResult<u64> {
    u64::try_from(value)
        .map_err(|_| AnalysisError::Format(format!("negative {}: {}", what, value)))
}

struct SdfReader<'a, B: ByteOrder> {
    cursor: Cursor<&'a [u8]>,
    _order: PhantomData<B>,
}

impl<'a, B: ByteOrder> SdfReader<'a, B> {
    fn new(bytes: &'a [u8]) -> Self {
        SdfReader { cursor: Cursor::new(bytes), _order: PhantomData }
    }

    fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    fn seek(&mut self, pos: u64) -> AnalysisResult<()> {
        if pos > self.len() {
            return Err(AnalysisError::Format(format!(
                "offset {} is past the end of the file ({} bytes)",
                pos,
                self.len()
            )));
        }
        self.cursor.seek(SeekFrom::Start(pos)).map_err(truncated)?;
        Ok(())
    }

    fn i32(&mut self) -> AnalysisResult<i32> {
        self.cursor.read_i32::<B>().map_err(truncated)
    }

    fn i64(&mut self) -> AnalysisResult<i64> {
        self.cursor.read_i64::<B>().map_err(truncated)
    }

    fn f64(&mut self) -> AnalysisResult<f64> {
        self.cursor.read_f64::<B>().map_err(truncated)
    }

    fn flag(&mut self) -> AnalysisResult<bool> {
        Ok(self.cursor.read_u8().map_err(truncated)? != 0)
    }

    fn offset(&mut self, what: &str) -> AnalysisResult<u64> {
        let value = self.i64()?;
        non_negative(value, what)
    }

    /// Fixed-width string, padded with NULs or spaces.
    fn string(&mut self, len: usize) -> AnalysisResult<String> {
        let remaining = self.len().saturating_sub(self.cursor.position());
        if len as u64 > remaining {
            return Err(AnalysisError::Format(format!(
                "string of {} bytes runs past the end of the file",
                len
            )));
        }
        let mut buf = vec![0u8; len];
        self.cursor.read_exact(&mut buf).map_err(truncated)?;
        let text = String::from_utf8_lossy(&buf);
        Ok(text.trim_end_matches(|c| c == '\0' || c == ' ').to_string())
    }

    fn f64_array(&mut self, count: usize) -> AnalysisResult<Vec<f64>> {
        (0..count).map(|_| self.f64()).collect()
    }

    fn string_array(&mut self, count: usize) -> AnalysisResult<Vec<String>> {
        (0..count).map(|_| self.string(ID_LENGTH)).collect()
    }

    fn value(&mut self, data_type: DataType) -> AnalysisResult<f64> {
        let value = match data_type {
            DataType::Int32 => self.cursor.read_i32::<B>().map_err(truncated)? as f64,
            DataType::Int64 => self.cursor.read_i64::<B>().map_err(truncated)? as f64,
            DataType::Real32 => self.cursor.read_f32::<B>().map_err(truncated)? as f64,
            DataType::Real64 => self.cursor.read_f64::<B>().map_err(truncated)?,
            DataType::Other(code) => {
                return Err(AnalysisError::Format(format!("unsupported data type code {}", code)))
            }
        };
        Ok(value)
    }

    /// Reads `count` elements of `data_type`, widening them to f64.
    fn values(&mut self, data_type: DataType, count: usize) -> AnalysisResult<Vec<f64>> {
        let size = data_type.size().ok_or_else(|| {
            AnalysisError::Format(format!("unsupported data type code {}", data_type.code()))
        })?;
        let remaining = self.len().saturating_sub(self.cursor.position());
        let needed = (count as u64).checked_mul(size as u64);
        if needed.map_or(true, |n| n > remaining) {
            return Err(AnalysisError::Format(format!(
                "array of {} elements runs past the end of the file",
                count
            )));
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.value(data_type)?);
        }
        Ok(out)
    }

    fn read_header(&mut self) -> AnalysisResult<SdfHeader> {
        self.seek(8)?;
        let version = self.i32()?;
        let revision = self.i32()?;
        if version != SDF_VERSION {
            return Err(AnalysisError::Format(format!("unsupported SDF version {}", version)));
        }
        let code_name = self.string(ID_LENGTH)?;
        let first_block_location = self.offset("first block location")?;
        let _summary_location = self.i64()?;
        let _summary_size = self.i32()?;
        let nblocks = self.i32()?;
        let block_header_length = self.i32()?;
        let step = self.i32()?;
        let time = self.f64()?;
        let _jobid1 = self.i32()?;
        let _jobid2 = self.i32()?;
        let string_length = self.i32()?;
        let code_io_version = self.i32()?;
        let restart_flag = self.flag()?;
        let other_domains = self.flag()?;

        if nblocks < 0 || block_header_length <= 0 || string_length <= 0 {
            return Err(AnalysisError::Format(format!(
                "invalid header: nblocks={}, block_header_length={}, string_length={}",
                nblocks, block_header_length, string_length
            )));
        }

        Ok(SdfHeader {
            version,
            revision,
            code_name,
            first_block_location,
            nblocks,
            block_header_length,
            step,
            time,
            string_length,
            code_io_version,
            restart_flag,
            other_domains,
        })
    }

    fn read_block_header(&mut self, header: &SdfHeader, block_start: u64) -> AnalysisResult<BlockHeader> {
        self.seek(block_start)?;
        let next_block_location = self.offset("next block location")?;
        let data_location = self.offset("data location")?;
        let id = self.string(ID_LENGTH)?;
        let data_length = self.offset("data length")?;
        let block_type = BlockType::from_code(self.i32()?);
        let data_type = DataType::from_code(self.i32()?);
        let ndims = self.i32()?;
        let name = self.string(header.string_length as usize)?;
        if !(0..=3).contains(&ndims) {
            return Err(AnalysisError::Format(format!(
                "block '{}' has {} dimensions",
                id, ndims
            )));
        }
        Ok(BlockHeader {
            block_start,
            next_block_location,
            data_location,
            id,
            data_length,
            block_type,
            data_type,
            ndims: ndims as usize,
            name,
        })
    }

    fn read_snapshot(mut self) -> AnalysisResult<Snapshot> {
        let header = self.read_header()?;
        debug!(
            "SDF header: code '{}', version {}.{}, step {}, time {:e} s, {} blocks",
            header.code_name, header.version, header.revision, header.step, header.time, header.nblocks
        );

        let mut snapshot = Snapshot::new(header.code_name.clone(), header.step, header.time);
        let mut location = header.first_block_location;
        for index in 0..header.nblocks {
            let block_header = self.read_block_header(&header, location)?;
            trace!(
                "block {}: id='{}' name='{}' type={:?} dtype={:?} ndims={} data_length={}",
                index,
                block_header.id,
                block_header.name,
                block_header.block_type,
                block_header.data_type,
                block_header.ndims,
                block_header.data_length
            );
            let metadata_start = location + header.block_header_length as u64;
            match self.read_block(&block_header, metadata_start)? {
                Some(block) => snapshot.insert(block),
                None => debug!(
                    "Skipping block '{}' ({:?})",
                    block_header.name, block_header.block_type
                ),
            }
            location = block_header.next_block_location;
        }
        Ok(snapshot)
    }

    fn read_block(&mut self, bh: &BlockHeader, metadata_start: u64) -> AnalysisResult<Option<Block>> {
        let (units, data) = match bh.block_type {
            BlockType::PlainMesh | BlockType::PointMesh => {
                self.seek(metadata_start)?;
                let _mults = self.f64_array(bh.ndims)?;
                let _labels = self.string_array(bh.ndims)?;
                let units = self.string_array(bh.ndims)?;
                let _geometry = self.i32()?;
                let _extents = self.f64_array(2 * bh.ndims)?;
                let lengths = if bh.block_type == BlockType::PlainMesh {
                    let mut dims = Vec::with_capacity(bh.ndims);
                    for _ in 0..bh.ndims {
                        let dim = self.i32()?;
                        dims.push(non_negative(dim as i64, "mesh dimension")? as usize);
                    }
                    dims
                } else {
                    let npart = self.offset("particle count")? as usize;
                    vec![npart; bh.ndims]
                };
                self.seek(bh.data_location)?;
                let mut axes = Vec::with_capacity(bh.ndims);
                for len in lengths {
                    axes.push(self.values(bh.data_type, len)?);
                }
                (units, BlockData::Mesh { axes })
            }
            BlockType::PlainVariable | BlockType::PointVariable => {
                self.seek(metadata_start)?;
                let _mult = self.f64()?;
                let units = self.string(ID_LENGTH)?;
                let _mesh_id = self.string(ID_LENGTH)?;
                let dims = if bh.block_type == BlockType::PlainVariable {
                    let mut dims = Vec::with_capacity(bh.ndims);
                    for _ in 0..bh.ndims {
                        let dim = self.i32()?;
                        dims.push(non_negative(dim as i64, "variable dimension")? as usize);
                    }
                    let _stagger = self.i32()?;
                    dims
                } else {
                    vec![self.offset("particle count")? as usize]
                };
                let count = dims
                    .iter()
                    .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
                    .ok_or_else(|| {
                        AnalysisError::Format(format!("block '{}' has oversized dimensions {:?}", bh.id, dims))
                    })?;
                self.seek(bh.data_location)?;
                let values = self.values(bh.data_type, count)?;
                (vec![units], BlockData::Variable { dims, values })
            }
            BlockType::Constant => {
                self.seek(metadata_start)?;
                (Vec::new(), BlockData::Constant(self.value(bh.data_type)?))
            }
            BlockType::Other(_) => return Ok(None),
        };

        Ok(Some(Block {
            id: bh.id.clone(),
            name: bh.name.clone(),
            block_type: bh.block_type,
            units,
            data,
        }))
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    //! Minimal SDF writer used to build test files.

    use super::*;
    use byteorder::WriteBytesExt;

    pub const STRING_LENGTH: usize = 64;
    pub const HEADER_LENGTH: usize = 112;
    pub const BLOCK_HEADER_LENGTH: usize = 8 + 8 + ID_LENGTH + 8 + 4 + 4 + 4 + STRING_LENGTH + 4;

    pub enum FixtureBlock {
        PlainMesh { name: String, axes: Vec<Vec<f64>> },
        PointMesh { name: String, axes: Vec<Vec<f64>> },
        PointVariable { name: String, data_type: DataType, values: Vec<f64> },
        PlainVariable { name: String, dims: Vec<i32>, values: Vec<f64> },
        Constant { name: String, value: f64 },
        Opaque { name: String, payload: Vec<u8> },
    }

    impl FixtureBlock {
        fn name(&self) -> &str {
            match self {
                FixtureBlock::PlainMesh { name, .. }
                | FixtureBlock::PointMesh { name, .. }
                | FixtureBlock::PointVariable { name, .. }
                | FixtureBlock::PlainVariable { name, .. }
                | FixtureBlock::Constant { name, .. }
                | FixtureBlock::Opaque { name, .. } => name,
            }
        }
    }

    fn put_string(buf: &mut Vec<u8>, text: &str, len: usize) {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(len, b' ');
        buf.extend_from_slice(&bytes[..len]);
    }

    fn put_values<B: ByteOrder>(buf: &mut Vec<u8>, data_type: DataType, values: &[f64]) {
        for &v in values {
            match data_type {
                DataType::Int32 => buf.write_i32::<B>(v as i32).unwrap(),
                DataType::Int64 => buf.write_i64::<B>(v as i64).unwrap(),
                DataType::Real32 => buf.write_f32::<B>(v as f32).unwrap(),
                _ => buf.write_f64::<B>(v).unwrap(),
            }
        }
    }

    fn mesh_metadata<B: ByteOrder>(axes: &[Vec<f64>], plain: bool) -> Vec<u8> {
        let mut meta = Vec::new();
        for _ in axes {
            meta.write_f64::<B>(1.0).unwrap();
        }
        for (i, _) in axes.iter().enumerate() {
            put_string(&mut meta, ["X", "Y", "Z"][i], ID_LENGTH);
        }
        for _ in axes {
            put_string(&mut meta, "m", ID_LENGTH);
        }
        meta.write_i32::<B>(1).unwrap();
        for axis in axes {
            meta.write_f64::<B>(axis.iter().copied().fold(f64::INFINITY, f64::min)).unwrap();
        }
        for axis in axes {
            meta.write_f64::<B>(axis.iter().copied().fold(f64::NEG_INFINITY, f64::max)).unwrap();
        }
        if plain {
            for axis in axes {
                meta.write_i32::<B>(axis.len() as i32).unwrap();
            }
        } else {
            meta.write_i64::<B>(axes.first().map_or(0, |a| a.len()) as i64).unwrap();
        }
        meta
    }

    /// Serialises `blocks` into an SDF file in byte order `B`.
    pub fn write<B: ByteOrder>(blocks: &[FixtureBlock], step: i32, time: f64) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(SDF_MAGIC);
        buf.write_i32::<B>(ENDIANNESS_MARKER).unwrap();
        buf.write_i32::<B>(SDF_VERSION).unwrap();
        buf.write_i32::<B>(1).unwrap();
        put_string(&mut buf, "Epoch2d", ID_LENGTH);
        buf.write_i64::<B>(HEADER_LENGTH as i64).unwrap();
        buf.write_i64::<B>(0).unwrap();
        buf.write_i32::<B>(0).unwrap();
        buf.write_i32::<B>(blocks.len() as i32).unwrap();
        buf.write_i32::<B>(BLOCK_HEADER_LENGTH as i32).unwrap();
        buf.write_i32::<B>(step).unwrap();
        buf.write_f64::<B>(time).unwrap();
        buf.write_i32::<B>(0).unwrap();
        buf.write_i32::<B>(0).unwrap();
        buf.write_i32::<B>(STRING_LENGTH as i32).unwrap();
        buf.write_i32::<B>(1).unwrap();
        buf.push(0);
        buf.push(0);
        buf.resize(HEADER_LENGTH, 0);

        for block in blocks {
            let (block_type, data_type, ndims, metadata, data) = match block {
                FixtureBlock::PlainMesh { axes, .. } | FixtureBlock::PointMesh { axes, .. } => {
                    let plain = matches!(block, FixtureBlock::PlainMesh { .. });
                    let mut data = Vec::new();
                    for axis in axes {
                        put_values::<B>(&mut data, DataType::Real64, axis);
                    }
                    let block_type = if plain { BlockType::PlainMesh } else { BlockType::PointMesh };
                    (block_type, DataType::Real64, axes.len(), mesh_metadata::<B>(axes, plain), data)
                }
                FixtureBlock::PointVariable { data_type, values, .. } => {
                    let mut meta = Vec::new();
                    meta.write_f64::<B>(1.0).unwrap();
                    put_string(&mut meta, "", ID_LENGTH);
                    put_string(&mut meta, "grid", ID_LENGTH);
                    meta.write_i64::<B>(values.len() as i64).unwrap();
                    let mut data = Vec::new();
                    put_values::<B>(&mut data, *data_type, values);
                    (BlockType::PointVariable, *data_type, 1, meta, data)
                }
                FixtureBlock::PlainVariable { dims, values, .. } => {
                    let mut meta = Vec::new();
                    meta.write_f64::<B>(1.0).unwrap();
                    put_string(&mut meta, "V/m", ID_LENGTH);
                    put_string(&mut meta, "grid", ID_LENGTH);
                    for &dim in dims {
                        meta.write_i32::<B>(dim).unwrap();
                    }
                    meta.write_i32::<B>(0).unwrap();
                    let mut data = Vec::new();
                    put_values::<B>(&mut data, DataType::Real64, values);
                    (BlockType::PlainVariable, DataType::Real64, dims.len(), meta, data)
                }
                FixtureBlock::Constant { value, .. } => {
                    let mut meta = Vec::new();
                    meta.write_f64::<B>(*value).unwrap();
                    (BlockType::Constant, DataType::Real64, 1, meta, Vec::new())
                }
                FixtureBlock::Opaque { payload, .. } => {
                    (BlockType::Other(20), DataType::Other(8), 1, Vec::new(), payload.clone())
                }
            };

            let start = buf.len();
            let data_location = start + BLOCK_HEADER_LENGTH + metadata.len();
            let next = data_location + data.len();
            buf.write_i64::<B>(next as i64).unwrap();
            buf.write_i64::<B>(data_location as i64).unwrap();
            put_string(&mut buf, &block.name().to_lowercase(), ID_LENGTH);
            buf.write_i64::<B>(data.len() as i64).unwrap();
            buf.write_i32::<B>(block_type.code()).unwrap();
            buf.write_i32::<B>(data_type.code()).unwrap();
            buf.write_i32::<B>(ndims as i32).unwrap();
            put_string(&mut buf, block.name(), STRING_LENGTH);
            buf.write_i32::<B>(metadata.len() as i32).unwrap();
            buf.extend_from_slice(&metadata);
            buf.extend_from_slice(&data);
        }
        buf
    }

    /// A small 2D snapshot with a "Photon" species of three particles.
    pub fn photon_blocks() -> Vec<FixtureBlock> {
        vec![
            FixtureBlock::Constant { name: "dt".into(), value: 1.5e-16 },
            FixtureBlock::PlainMesh {
                name: "Grid/Grid".into(),
                axes: vec![vec![-1.0e-5, 0.0, 1.0e-5], vec![-2.0e-5, 0.0, 2.0e-5]],
            },
            FixtureBlock::PointMesh {
                name: "Grid/Particles/Photon".into(),
                axes: vec![vec![1.0e-6, 2.0e-6, 3.0e-6], vec![-1.0e-6, 0.0, 1.0e-6]],
            },
            FixtureBlock::Opaque { name: "CPU split/Photon".into(), payload: vec![7; 24] },
            FixtureBlock::PointVariable {
                name: "Particles/Weight/Photon".into(),
                data_type: DataType::Real32,
                values: vec![0.5, 1.0, 2.0],
            },
            FixtureBlock::PointVariable {
                name: "Particles/ID/Photon".into(),
                data_type: DataType::Int64,
                values: vec![11.0, 12.0, 13.0],
            },
            FixtureBlock::PointVariable {
                name: "Particles/QED energy/Photon".into(),
                data_type: DataType::Real64,
                values: vec![1.602e-17, 1.602e-16, 1.602e-15],
            },
        ]
    }
}
