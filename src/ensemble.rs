use epoch_common::{
    ballistic_projection, particle_grid_key, particle_key, AnalysisError, AnalysisResult, Snapshot, Vec2,
};
use log::{debug, info};

/// Per-particle data of one species, stored as parallel arrays.
///
/// All arrays share the same length and ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleEnsemble {
    // Positions on the simulation plane (z = 0)
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    // Momentum components
    pub px: Vec<f64>,
    pub py: Vec<f64>,
    pub pz: Vec<f64>,
    // Macro-particle weights
    pub weight: Vec<f64>,
}

/// Projected transverse coordinates of every particle at one distance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedPoints {
    pub distance: f64,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Min/max of the finite values, or `None` if there are none.
fn finite_extent(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().filter(|v| v.is_finite()).fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

impl ProjectedPoints {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// `(x_min, x_max)`, ignoring non-finite coordinates.
    pub fn x_extent(&self) -> Option<(f64, f64)> {
        finite_extent(&self.x)
    }

    /// `(y_min, y_max)`, ignoring non-finite coordinates.
    pub fn y_extent(&self) -> Option<(f64, f64)> {
        finite_extent(&self.y)
    }
}

impl ParticleEnsemble {
    /// Creates an ensemble, checking that every array matches `x` in length.
    pub fn new(
        x: Vec<f64>,
        y: Vec<f64>,
        px: Vec<f64>,
        py: Vec<f64>,
        pz: Vec<f64>,
        weight: Vec<f64>,
    ) -> AnalysisResult<Self> {
        let expected = x.len();
        for (field, len) in [
            ("y", y.len()),
            ("px", px.len()),
            ("py", py.len()),
            ("pz", pz.len()),
            ("weight", weight.len()),
        ] {
            if len != expected {
                return Err(AnalysisError::ShapeMismatch { field: field.to_string(), expected, found: len });
            }
        }
        Ok(ParticleEnsemble { x, y, px, py, pz, weight })
    }

    /// Extracts a species from a snapshot: positions from the species' point
    /// mesh, momenta and weights from its particle variables.
    pub fn from_snapshot(snapshot: &Snapshot, species: &str) -> AnalysisResult<Self> {
        let grid_key = particle_grid_key(species);
        let x = snapshot.mesh_axis(&grid_key, 0)?.to_vec();
        let y = snapshot.mesh_axis(&grid_key, 1)?.to_vec();
        let px = snapshot.array(&particle_key("Px", species))?.to_vec();
        let py = snapshot.array(&particle_key("Py", species))?.to_vec();
        let pz = snapshot.array(&particle_key("Pz", species))?.to_vec();
        let weight = snapshot.array(&particle_key("Weight", species))?.to_vec();
        let ensemble = Self::new(x, y, px, py, pz, weight)?;
        info!("Loaded {} '{}' particles (total weight {:.4e}).", ensemble.len(), species, ensemble.total_weight());
        Ok(ensemble)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.weight.iter().sum()
    }

    /// Number of particles with zero longitudinal momentum.
    pub fn count_transverse(&self) -> usize {
        self.pz.iter().filter(|&&pz| pz == 0.0).count()
    }

    /// Removes particles with zero longitudinal momentum, which cannot be
    /// projected. Returns how many were removed.
    pub fn drop_transverse(&mut self) -> usize {
        let keep: Vec<bool> = self.pz.iter().map(|&pz| pz != 0.0).collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return 0;
        }
        for column in [&mut self.x, &mut self.y, &mut self.px, &mut self.py, &mut self.pz, &mut self.weight] {
            let mut flags = keep.iter();
            column.retain(|_| *flags.next().unwrap_or(&false));
        }
        debug!("Dropped {} particles with pz == 0; {} remain.", removed, self.len());
        removed
    }

    /// Position of one particle on the simulation plane.
    pub fn position(&self, idx: usize) -> Vec2 {
        Vec2::new(self.x[idx], self.y[idx])
    }

    /// Straight-line projection of every particle to the plane at `distance`.
    ///
    /// Fails with a domain error if any particle has `pz == 0`.
    pub fn project(&self, distance: f64) -> AnalysisResult<ProjectedPoints> {
        if let Some(idx) = self.pz.iter().position(|&pz| pz == 0.0) {
            return Err(AnalysisError::domain(format!(
                "particle {} has zero longitudinal momentum and cannot be projected \
                 ({} such particles in total)",
                idx,
                self.count_transverse()
            )));
        }
        let (x, y): (Vec<f64>, Vec<f64>) = (0..self.len())
            .map(|i| {
                let p = ballistic_projection(self.position(i), self.px[i], self.py[i], self.pz[i], distance);
                (p.x, p.y)
            })
            .unzip();
        Ok(ProjectedPoints { distance, x, y })
    }
}

#[cfg(test)]
impl ProjectedPoints {
    fn point(&self, idx: usize) -> Vec2 {
        Vec2::new(self.x[idx], self.y[idx])
    }
}
