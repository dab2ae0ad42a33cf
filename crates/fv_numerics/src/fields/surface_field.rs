// crates/fv_numerics/src/fields/surface_field.rs

//! 面场：内部面值加逐 patch 面值（通量、面扩散系数）

use super::value::FieldValue;
use fv_foundation::{DimensionSet, FvError, FvResult};
use fv_mesh::FvMesh;

/// 面场
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceField<T: FieldValue> {
    name: String,
    dimensions: DimensionSet,
    internal: Vec<T>,
    boundary: Vec<Vec<T>>,
}

/// 标量面场（通量）
pub type SurfaceScalarField = SurfaceField<f64>;

impl<T: FieldValue> SurfaceField<T> {
    /// 由内部面值与逐 patch 面值创建
    pub fn new(
        mesh: &FvMesh,
        name: impl Into<String>,
        dimensions: DimensionSet,
        internal: Vec<T>,
        boundary: Vec<Vec<T>>,
    ) -> FvResult<Self> {
        FvError::check_size("surface internal", mesh.n_internal_faces(), internal.len())?;
        FvError::check_size("surface patches", mesh.patches().len(), boundary.len())?;
        for (patch, values) in mesh.patches().iter().zip(&boundary) {
            FvError::check_size("surface patch values", patch.size, values.len())?;
        }
        Ok(Self {
            name: name.into(),
            dimensions,
            internal,
            boundary,
        })
    }

    /// 所有面取同一值
    pub fn uniform(
        mesh: &FvMesh,
        name: impl Into<String>,
        dimensions: DimensionSet,
        value: T,
    ) -> Self {
        Self {
            name: name.into(),
            dimensions,
            internal: vec![value; mesh.n_internal_faces()],
            boundary: mesh.patches().iter().map(|p| vec![value; p.size]).collect(),
        }
    }

    /// 场名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 量纲
    #[inline]
    pub fn dimensions(&self) -> DimensionSet {
        self.dimensions
    }

    /// 内部面值
    #[inline]
    pub fn internal(&self) -> &[T] {
        &self.internal
    }

    /// 内部面值（可写）
    #[inline]
    pub fn internal_mut(&mut self) -> &mut [T] {
        &mut self.internal
    }

    /// 全部 patch 面值
    #[inline]
    pub fn boundary(&self) -> &[Vec<T>] {
        &self.boundary
    }

    /// 全部 patch 面值（可写）
    #[inline]
    pub fn boundary_mut(&mut self) -> &mut [Vec<T>] {
        &mut self.boundary
    }

    /// 逐面变换，量纲由调用方给出
    pub fn map<U: FieldValue>(
        &self,
        name: impl Into<String>,
        dimensions: DimensionSet,
        f: impl Fn(T) -> U,
    ) -> SurfaceField<U> {
        SurfaceField {
            name: name.into(),
            dimensions,
            internal: self.internal.iter().map(|&v| f(v)).collect(),
            boundary: self
                .boundary
                .iter()
                .map(|p| p.iter().map(|&v| f(v)).collect())
                .collect(),
        }
    }

    /// 逐面加上同形面场（量纲须一致）
    pub fn add_assign(&mut self, other: &Self) -> FvResult<()> {
        if self.dimensions != other.dimensions {
            return Err(FvError::dimension_mismatch(
                "surface +=",
                &self.name,
                self.dimensions,
                other.dimensions,
            ));
        }
        FvError::check_size("surface internal", self.internal.len(), other.internal.len())?;
        for (a, &b) in self.internal.iter_mut().zip(&other.internal) {
            *a += b;
        }
        for (pa, pb) in self.boundary.iter_mut().zip(&other.boundary) {
            for (a, &b) in pa.iter_mut().zip(pb) {
                *a += b;
            }
        }
        Ok(())
    }

    /// 逐面减去同形面场（量纲须一致）
    pub fn sub_assign(&mut self, other: &Self) -> FvResult<()> {
        let negated = other.map(other.name.clone(), other.dimensions, |v| -v);
        self.add_assign(&negated)
    }

    /// 全部面值乘标量
    pub fn scale(&mut self, factor: f64) {
        for v in self.internal.iter_mut().chain(self.boundary.iter_mut().flatten()) {
            *v = *v * factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv_mesh::generation::line_mesh;

    #[test]
    fn test_uniform_and_arithmetic() {
        let mesh = line_mesh(3, 1.0).unwrap();
        let mut phi = SurfaceField::uniform(&mesh, "phi", DimensionSet::FLUX, 1.0);
        assert_eq!(phi.internal().len(), 2);
        assert_eq!(phi.boundary().len(), 2);

        let other = SurfaceField::uniform(&mesh, "dphi", DimensionSet::FLUX, 0.5);
        phi.sub_assign(&other).unwrap();
        phi.scale(4.0);
        assert_eq!(phi.internal(), &[2.0, 2.0]);
        assert_eq!(phi.boundary()[1], vec![2.0]);

        let wrong = SurfaceField::uniform(&mesh, "x", DimensionSet::LENGTH, 1.0);
        assert!(phi.add_assign(&wrong).is_err());
    }

    #[test]
    fn test_size_checked() {
        let mesh = line_mesh(3, 1.0).unwrap();
        let bad = SurfaceField::new(&mesh, "phi", DimensionSet::FLUX, vec![0.0; 3], vec![vec![0.0]; 2]);
        assert!(bad.is_err());
    }
}
