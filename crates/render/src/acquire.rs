//! Ordered, fallible device acquisition.
//!
//! Each step may suspend and each step is an exit point. The chain either
//! yields a fully configured [`Acquired`] or a typed [`InitError`]; nothing
//! downstream ever sees a half-acquired device.

use tracing::Instrument;

use crate::error::InitError;

/// A graphics backend as seen by the acquisition chain.
#[allow(async_fn_in_trait)]
pub trait GraphicsPlatform {
    type Adapter;
    type Device;
    type Presentation;

    /// Whether the graphics API exists at all on this platform.
    fn is_supported(&self) -> bool;

    async fn request_adapter(&mut self) -> Option<Self::Adapter>;

    async fn request_device(&mut self, adapter: &Self::Adapter) -> Result<Self::Device, InitError>;

    /// Bind the drawable to the device. `None` if the drawable cannot present.
    fn presentation_context(
        &mut self,
        adapter: &Self::Adapter,
        device: &Self::Device,
    ) -> Option<Self::Presentation>;

    /// Negotiate the pixel format and configure with opaque alpha.
    fn configure(
        &mut self,
        adapter: &Self::Adapter,
        device: &Self::Device,
        presentation: &mut Self::Presentation,
    );
}

/// Output of a successful acquisition chain.
pub struct Acquired<P: GraphicsPlatform> {
    pub adapter: P::Adapter,
    pub device: P::Device,
    pub presentation: P::Presentation,
}

/// Run the acquisition steps in order, stopping at the first failure.
pub async fn acquire<P: GraphicsPlatform>(platform: &mut P) -> Result<Acquired<P>, InitError> {
    async move {
        if !platform.is_supported() {
            return Err(InitError::UnsupportedPlatform);
        }
        tracing::debug!("graphics platform available");

        let adapter = platform
            .request_adapter()
            .await
            .ok_or(InitError::NoAdapter)?;
        tracing::debug!("adapter selected");

        let device = platform.request_device(&adapter).await?;
        tracing::debug!("logical device created");

        let mut presentation = platform
            .presentation_context(&adapter, &device)
            .ok_or(InitError::NoPresentationContext)?;
        platform.configure(&adapter, &device, &mut presentation);
        tracing::debug!("presentation configured");

        Ok(Acquired {
            adapter,
            device,
            presentation,
        })
    }
    .instrument(tracing::info_span!("acquire_device"))
    .await
}
