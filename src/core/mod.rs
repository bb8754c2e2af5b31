pub mod etl;

pub use crate::domain::model::{CtdRecord, GaugeStation, MooringRecord};
pub use crate::domain::ports::{Pipeline, Storage};
pub use crate::utils::error::Result;
