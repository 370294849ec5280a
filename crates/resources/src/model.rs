//! Models: a mesh plus one material per submesh.

/// A drawable model.
///
/// `materials[i]` is the material of submesh `i` of `mesh`. Both are indices
/// into the registry that created the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    pub mesh: usize,
    pub materials: Vec<usize>,
}

impl Model {
    pub fn new(mesh: usize, materials: Vec<usize>) -> Self {
        Self { mesh, materials }
    }

    /// Material of submesh `submesh`, falling back to the default material.
    pub fn material_for(&self, submesh: usize) -> usize {
        self.materials.get(submesh).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_for_falls_back_to_default() {
        let model = Model::new(2, vec![4, 5]);
        assert_eq!(model.material_for(1), 5);
        assert_eq!(model.material_for(9), 0);
    }
}
