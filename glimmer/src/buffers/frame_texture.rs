use derivative::Derivative;
use glam::UVec2;
use log::info;

use crate::{Backend, Error, Result};

/// Frame-sized texture, recreated whenever the frame size changes.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct FrameTexture<B>
where
    B: Backend,
{
    label: &'static str,
    texture: Option<(UVec2, B::Texture)>,
}

impl<B> FrameTexture<B>
where
    B: Backend,
{
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            texture: None,
        }
    }

    /// Returns whether the texture got (re)created.
    pub fn ensure(&mut self, backend: &mut B, size: UVec2) -> Result<bool> {
        if let Some((curr_size, _)) = &self.texture {
            if *curr_size == size {
                return Ok(false);
            }
        }

        info!("Creating texture `{}`; size={}", self.label, size);

        self.texture = Some((size, backend.create_texture(self.label, size)?));

        Ok(true)
    }

    pub fn get(&self) -> Result<&B::Texture> {
        self.texture
            .as_ref()
            .map(|(_, texture)| texture)
            .ok_or_else(|| Error::Unallocated(self.label.into()))
    }

    pub fn size(&self) -> Option<UVec2> {
        self.texture.as_ref().map(|(size, _)| *size)
    }
}
