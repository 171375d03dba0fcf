use crate::error::{AnalysisError, AnalysisResult};
use crate::sdf::{self, BlockType};
use log::info;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Key of the simulation grid (node coordinates per axis).
pub const GRID_KEY: &str = "Grid/Grid";

/// Key of a per-particle variable, e.g. `Particles/Px/Photon`.
pub fn particle_key(field: &str, species: &str) -> String {
    format!("Particles/{}/{}", field, species)
}

/// Key of the point mesh holding a species' particle positions.
pub fn particle_grid_key(species: &str) -> String {
    format!("Grid/Particles/{}", species)
}

/// Decoded payload of a snapshot block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockData {
    /// One coordinate array per dimension. For a plain mesh these are the
    /// grid axes; for a point mesh, per-particle positions.
    Mesh { axes: Vec<Vec<f64>> },
    /// Flat values with their dimensions (a single entry for per-particle data).
    Variable { dims: Vec<usize>, values: Vec<f64> },
    Constant(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub name: String,
    pub block_type: BlockType,
    pub units: Vec<String>,
    pub data: BlockData,
}

impl Block {
    /// Per-particle variable block, used when assembling snapshots in memory.
    pub fn point_variable(name: impl Into<String>, values: Vec<f64>) -> Self {
        let name = name.into();
        Block {
            id: name.to_lowercase(),
            block_type: BlockType::PointVariable,
            units: Vec::new(),
            data: BlockData::Variable { dims: vec![values.len()], values },
            name,
        }
    }

    /// Mesh block; `point` selects a particle mesh over a grid mesh.
    pub fn mesh(name: impl Into<String>, axes: Vec<Vec<f64>>, point: bool) -> Self {
        let name = name.into();
        Block {
            id: name.to_lowercase(),
            block_type: if point { BlockType::PointMesh } else { BlockType::PlainMesh },
            units: Vec::new(),
            data: BlockData::Mesh { axes },
            name,
        }
    }

    /// Short human-readable description of the payload shape.
    pub fn describe(&self) -> String {
        match &self.data {
            BlockData::Mesh { axes } => {
                let lens: Vec<String> = axes.iter().map(|a| a.len().to_string()).collect();
                format!("{:?} [{}]", self.block_type, lens.join(" x "))
            }
            BlockData::Variable { dims, .. } => {
                let dims: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
                format!("{:?} [{}]", self.block_type, dims.join(" x "))
            }
            BlockData::Constant(value) => format!("Constant = {}", value),
        }
    }
}

/// All decoded blocks of one simulation output file, keyed by block name.
///
/// Read once, then only queried.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub code_name: String,
    pub step: i32,
    /// Simulation time in seconds.
    pub time: f64,
    blocks: BTreeMap<String, Block>,
    names_by_id: HashMap<String, String>,
}

impl Snapshot {
    pub fn new(code_name: impl Into<String>, step: i32, time: f64) -> Self {
        Snapshot {
            code_name: code_name.into(),
            step,
            time,
            blocks: BTreeMap::new(),
            names_by_id: HashMap::new(),
        }
    }

    /// Loads an SDF file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> AnalysisResult<Self> {
        let path_ref = path.as_ref();
        let bytes = std::fs::read(path_ref).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AnalysisError::FileNotFound(path_ref.to_path_buf()),
            _ => AnalysisError::Io(e),
        })?;
        let snapshot = sdf::parse(&bytes)?;
        info!(
            "Loaded {} ({} bytes): {} step {}, t = {:e} s, {} blocks",
            path_ref.display(),
            bytes.len(),
            snapshot.code_name,
            snapshot.step,
            snapshot.time,
            snapshot.len()
        );
        Ok(snapshot)
    }

    /// Adds a block, replacing any earlier block with the same name.
    pub fn insert(&mut self, block: Block) {
        self.names_by_id.insert(block.id.clone(), block.name.clone());
        self.blocks.insert(block.name.clone(), block);
    }

    /// Builder-style [`Snapshot::insert`].
    pub fn with_block(mut self, block: Block) -> Self {
        self.insert(block);
        self
    }

    /// Looks a block up by name, falling back to its id.
    pub fn block(&self, key: &str) -> AnalysisResult<&Block> {
        self.blocks
            .get(key)
            .or_else(|| self.names_by_id.get(key).and_then(|name| self.blocks.get(name)))
            .ok_or_else(|| AnalysisError::DataNotFound { key: key.to_string() })
    }

    /// Values of a variable block.
    pub fn array(&self, key: &str) -> AnalysisResult<&[f64]> {
        match &self.block(key)?.data {
            BlockData::Variable { values, .. } => Ok(values),
            _ => Err(AnalysisError::DataNotFound { key: format!("{} (as variable)", key) }),
        }
    }

    /// Per-dimension coordinate arrays of a mesh block.
    pub fn mesh_axes(&self, key: &str) -> AnalysisResult<&[Vec<f64>]> {
        match &self.block(key)?.data {
            BlockData::Mesh { axes } => Ok(axes),
            _ => Err(AnalysisError::DataNotFound { key: format!("{} (as mesh)", key) }),
        }
    }

    /// One axis of a mesh block.
    pub fn mesh_axis(&self, key: &str, dim: usize) -> AnalysisResult<&[f64]> {
        self.mesh_axes(key)?
            .get(dim)
            .map(|axis| axis.as_slice())
            .ok_or_else(|| AnalysisError::DataNotFound { key: format!("{} (axis {})", key, dim) })
    }

    pub fn constant(&self, key: &str) -> AnalysisResult<f64> {
        match &self.block(key)?.data {
            BlockData::Constant(value) => Ok(*value),
            _ => Err(AnalysisError::DataNotFound { key: format!("{} (as constant)", key) }),
        }
    }

    /// Block names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Species that have a particle position mesh in this snapshot.
    pub fn species(&self) -> Vec<&str> {
        self.keys().filter_map(|k| k.strip_prefix("Grid/Particles/")).collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::fixture;
    use byteorder::LittleEndian;
    use std::io::Write;

    #[test]
    fn keys_follow_category_field_species_layout() {
        assert_eq!(particle_key("Px", "Photon"), "Particles/Px/Photon");
        assert_eq!(particle_grid_key("Electron"), "Grid/Particles/Electron");
    }

    #[test]
    fn open_reads_sdf_file_from_disk() {
        let bytes = fixture::write::<LittleEndian>(&fixture::photon_blocks(), 7, 1.0e-12);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();

        let snapshot = Snapshot::open(file.path()).unwrap();
        assert_eq!(snapshot.step, 7);
        assert_eq!(snapshot.species(), vec!["Photon"]);
        assert_eq!(snapshot.array(&particle_key("Weight", "Photon")).unwrap().len(), 3);
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Snapshot::open(dir.path().join("nope.sdf")).unwrap_err();
        assert!(matches!(err, AnalysisError::FileNotFound(_)));
    }

    #[test]
    fn missing_keys_are_data_not_found() {
        let snapshot = Snapshot::new("test", 0, 0.0)
            .with_block(Block::point_variable("Particles/Weight/Photon", vec![1.0]));
        let err = snapshot.array("Particles/Weight/Electron").unwrap_err();
        assert!(matches!(err, AnalysisError::DataNotFound { ref key } if key == "Particles/Weight/Electron"));
        assert!(snapshot.mesh_axes(GRID_KEY).is_err());
    }

    #[test]
    fn wrong_block_kind_is_data_not_found() {
        let snapshot = Snapshot::new("test", 0, 0.0)
            .with_block(Block::mesh(GRID_KEY, vec![vec![0.0, 1.0]], false));
        assert!(matches!(snapshot.array(GRID_KEY), Err(AnalysisError::DataNotFound { .. })));
        assert!(matches!(snapshot.mesh_axis(GRID_KEY, 1), Err(AnalysisError::DataNotFound { .. })));
        assert_eq!(snapshot.mesh_axis(GRID_KEY, 0).unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn describe_reports_shape() {
        let block = Block::mesh("Grid/Particles/Photon", vec![vec![0.0; 4], vec![0.0; 4]], true);
        assert_eq!(block.describe(), "PointMesh [4 x 4]");
    }
}
