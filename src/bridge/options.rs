use crate::device::DeviceSelector;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReduceOptions {
    /// `None` reduces over every axis.
    pub axes: Option<Vec<usize>>,
    pub keep_axes: bool,
}

impl ReduceOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn axes(axes: impl Into<Vec<usize>>) -> Self {
        Self {
            axes: Some(axes.into()),
            keep_axes: false,
        }
    }

    pub fn keep_axes(mut self, keep: bool) -> Self {
        self.keep_axes = keep;
        self
    }
}

/// Which index wins when several elements tie in argmax/argmin.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TieBreak {
    #[default]
    Low,
    High,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgReduceOptions {
    /// `None` reduces over the flattened tensor.
    pub axis: Option<usize>,
    pub keep_axis: bool,
    pub tie_break: TieBreak,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeOptions {
    pub axis: usize,
    pub reverse: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    pub axis: usize,
    pub direction: SortDirection,
}

/// What happens to a final batch shorter than the batch size.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Leftover {
    #[default]
    Discard,
    /// Wrap around to the start of the tensor to fill the last batch.
    Repeat,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    #[default]
    None,
    Transpose,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriangularSolveOptions {
    pub left_side: bool,
    pub lower: bool,
    pub transform_a: Transform,
}

impl Default for TriangularSolveOptions {
    fn default() -> Self {
        Self {
            left_side: true,
            lower: true,
            transform_a: Transform::None,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QrMode {
    #[default]
    Reduced,
    Complete,
}

/// Destination of a backend copy or transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Host,
    Device(DeviceSelector),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InspectOptions {
    /// Falls back to the configured inspect limit.
    pub limit: Option<usize>,
}
