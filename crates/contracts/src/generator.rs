//! ImageGenerator trait - synthetic image source

use crate::{ContractError, Image, SnapParams, StagePoint};

/// Synthetic image source
///
/// Holds a simulated scene that evolves one step per time point and
/// renders the field of view around a stage position.
pub trait ImageGenerator: Send {
    /// Advance the simulated scene by one time step
    fn step_positions(&mut self);

    /// Render a grayscale frame for one channel / focus / exposure
    fn snap_img(&mut self, position: StagePoint, params: SnapParams)
        -> Result<Image, ContractError>;

    /// Render an RGB composite of all channels
    fn snap_rgb(&mut self, position: StagePoint) -> Result<Image, ContractError>;
}

impl<G: ImageGenerator + ?Sized> ImageGenerator for Box<G> {
    fn step_positions(&mut self) {
        (**self).step_positions()
    }

    fn snap_img(
        &mut self,
        position: StagePoint,
        params: SnapParams,
    ) -> Result<Image, ContractError> {
        (**self).snap_img(position, params)
    }

    fn snap_rgb(&mut self, position: StagePoint) -> Result<Image, ContractError> {
        (**self).snap_rgb(position)
    }
}
