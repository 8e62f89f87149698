//! Scene Host
//!
//! Waits for the `base` asset group and then builds the world on top of a
//! [`RenderPipeline`]. Other groups are ignored.

use crate::assets::{AssetServer, BASE_GROUP, GroupFuture};
use crate::errors::Result;
use crate::renderer::RenderPipeline;
use crate::renderer::core::OutputDevice;

use super::human::Human;

pub struct SceneHost {
    base_ready: GroupFuture,
    human: Option<Human>,
}

impl SceneHost {
    pub fn new(assets: &mut AssetServer) -> Result<Self> {
        Ok(Self {
            base_ready: assets.group_ready(BASE_GROUP)?,
            human: None,
        })
    }

    /// Builds the human once the base group has completed and compiles its
    /// programs. Returns `true` on the poll that built it.
    pub fn poll<D: OutputDevice + 'static>(
        &mut self,
        pipeline: &mut RenderPipeline<D>,
        assets: &AssetServer,
    ) -> Result<bool> {
        if self.human.is_some() || !self.base_ready.try_resolve() {
            return Ok(false);
        }
        let human = Human::spawn(pipeline, assets)?;
        self.human = Some(human);
        pipeline.compile()?;
        Ok(true)
    }

    /// Forwards the frame clock to world objects.
    pub fn update(&mut self, elapsed: f64) {
        if let Some(human) = &mut self.human {
            human.update(elapsed);
        }
    }

    #[must_use]
    pub fn human(&self) -> Option<&Human> {
        self.human.as_ref()
    }
}
