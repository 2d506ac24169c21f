//! The registry of bones referenced by skin influences.
//!
//! Bones are numbered densely in the order their names are first seen while loading meshes.
//! This numbering is the bone index stored in the [WeightTable](crate::skinning::WeightTable)
//! and the index of each matrix returned by the skinning functions.
use glam::Mat4;
use indexmap::IndexMap;
use smol_str::SmolStr;

/// Bind pose and animated transforms for every bone referenced by the model's meshes.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Skeleton {
    bones: IndexMap<SmolStr, BoneInfo>,
}

/// A single bone in the [Skeleton].
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct BoneInfo {
    /// The transform from mesh space in the bind pose to the bone's local space.
    /// This is often called the inverse bind matrix.
    pub offset: Mat4,
    /// The skinning matrix from the most recent update.
    /// This is all zeros until the model has been updated at least once.
    pub final_transform: Mat4,
}

impl BoneInfo {
    fn new(offset: Mat4) -> Self {
        Self {
            offset,
            final_transform: Mat4::ZERO,
        }
    }
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of the bone with the given `name`
    /// or registers a new bone at the next index with the given `offset`.
    ///
    /// The `offset` is ignored for names that are already registered.
    /// The first offset seen for a bone is never overwritten.
    pub fn bone_index_or_insert(&mut self, name: &str, offset: Mat4) -> usize {
        match self.bones.get_index_of(name) {
            Some(index) => index,
            None => {
                let (index, _) = self.bones.insert_full(name.into(), BoneInfo::new(offset));
                index
            }
        }
    }

    /// The index of the bone with the given `name` or `None` if the name is not registered.
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.get_index_of(name)
    }

    pub fn bone(&self, index: usize) -> Option<&BoneInfo> {
        self.bones.get_index(index).map(|(_, b)| b)
    }

    pub fn bone_name(&self, index: usize) -> Option<&str> {
        self.bones.get_index(index).map(|(n, _)| n.as_str())
    }

    /// Bone names in index order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bones.keys().map(SmolStr::as_str)
    }

    /// Bones in index order.
    pub fn bones(&self) -> impl Iterator<Item = (&str, &BoneInfo)> {
        self.bones.iter().map(|(n, b)| (n.as_str(), b))
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// The skinning matrix from the most recent update for each bone in index order.
    pub fn final_transforms(&self) -> Vec<Mat4> {
        self.bones.values().map(|b| b.final_transform).collect()
    }

    pub(crate) fn offset(&self, index: usize) -> Mat4 {
        self.bones[index].offset
    }

    pub(crate) fn set_final_transform(&mut self, index: usize, transform: Mat4) {
        self.bones[index].final_transform = transform;
    }
}
