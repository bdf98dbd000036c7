//! Camera poses of an offline tracking run.

use std::ops::{Index, IndexMut};

use nalgebra::Isometry3;

/// Pose of the camera at one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OfflinePose {
    pub index: u32,
    /// Camera-to-world transformation; `None` if the frame could not be tracked.
    pub transformation: Option<Isometry3<f64>>,
    /// Algorithm-specific quality, e.g. number of correspondences.
    pub quality: f64,
}

impl OfflinePose {
    pub fn new(index: u32, transformation: Isometry3<f64>, quality: f64) -> Self {
        Self {
            index,
            transformation: Some(transformation),
            quality,
        }
    }

    pub fn invalid(index: u32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.transformation.is_some()
    }
}

/// Poses addressed by frame index, starting at `first_index`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OfflinePoses {
    first_index: u32,
    poses: Vec<OfflinePose>,
}

impl OfflinePoses {
    /// `len` invalid poses for the frames `first_index..first_index + len`.
    pub fn new(first_index: u32, len: usize) -> Self {
        let mut poses = Self {
            first_index,
            poses: Vec::new(),
        };
        poses.resize(len);
        poses
    }

    pub fn first_index(&self) -> u32 {
        self.first_index
    }

    /// Frame index of the last pose, `None` if empty.
    pub fn last_index(&self) -> Option<u32> {
        let len = u32::try_from(self.poses.len()).ok()?;
        len.checked_sub(1).map(|offset| self.first_index + offset)
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn is_valid_index(&self, index: u32) -> bool {
        self.offset(index).is_some()
    }

    pub fn get(&self, index: u32) -> Option<&OfflinePose> {
        self.offset(index).map(|offset| &self.poses[offset])
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut OfflinePose> {
        self.offset(index).map(|offset| &mut self.poses[offset])
    }

    /// Grow with invalid poses or shrink from the end.
    pub fn resize(&mut self, len: usize) {
        let first_index = self.first_index;
        let current = self.poses.len();
        if len <= current {
            self.poses.truncate(len);
        } else {
            self.poses.extend(
                (current..len).map(|offset| OfflinePose::invalid(first_index + offset as u32)),
            );
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &OfflinePose> {
        self.poses.iter()
    }

    pub fn valid_count(&self) -> usize {
        self.poses.iter().filter(|pose| pose.is_valid()).count()
    }

    fn offset(&self, index: u32) -> Option<usize> {
        let offset = index.checked_sub(self.first_index)? as usize;
        (offset < self.poses.len()).then_some(offset)
    }
}

impl Index<u32> for OfflinePoses {
    type Output = OfflinePose;

    fn index(&self, index: u32) -> &Self::Output {
        match self.get(index) {
            Some(pose) => pose,
            None => panic!("frame index {index} outside of the pose range"),
        }
    }
}

impl IndexMut<u32> for OfflinePoses {
    fn index_mut(&mut self, index: u32) -> &mut Self::Output {
        match self.offset(index) {
            Some(offset) => &mut self.poses[offset],
            None => panic!("frame index {index} outside of the pose range"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Translation3, UnitQuaternion};

    #[test]
    fn test_shifted_indexing() {
        let mut poses = OfflinePoses::new(10, 6);
        assert_eq!(poses.len(), 6);
        assert_eq!(poses.first_index(), 10);
        assert_eq!(poses.last_index(), Some(15));
        assert!(poses.is_valid_index(15));
        assert!(!poses.is_valid_index(9));
        assert!(!poses.is_valid_index(16));
        assert_eq!(poses[12].index, 12);
        assert!(!poses[12].is_valid());

        let transformation =
            Isometry3::from_parts(Translation3::new(1.0, 2.0, 3.0), UnitQuaternion::identity());
        poses[12] = OfflinePose::new(12, transformation, 42.0);
        assert!(poses.get(12).unwrap().is_valid());
        assert_eq!(poses.valid_count(), 1);
    }

    #[test]
    fn test_resize_keeps_indices() {
        let mut poses = OfflinePoses::new(3, 2);
        poses.resize(4);
        assert_eq!(poses.iter().map(|p| p.index).collect::<Vec<_>>(), vec![3, 4, 5, 6]);
        poses.resize(1);
        assert_eq!(poses.last_index(), Some(3));
        poses.resize(0);
        assert_eq!(poses.last_index(), None);
    }

    #[test]
    #[should_panic]
    fn test_index_out_of_range_panics() {
        let poses = OfflinePoses::new(5, 1);
        let _ = poses[4];
    }
}
