/// Captures validation and out-of-memory errors raised on a device.
///
/// Every wgpu call made between [`ErrorScope::push`] and [`ErrorScope::finish`]
/// on the same thread reports into this scope instead of the device's
/// uncaptured-error handler. Dropping the scope without finishing discards
/// whatever it caught.
#[must_use = "an error scope must be finished to observe the errors it caught"]
pub struct ErrorScope {
    // Popped in reverse push order: fields drop top to bottom.
    validation: wgpu::ErrorScopeGuard,
    out_of_memory: wgpu::ErrorScopeGuard,
}

impl ErrorScope {
    pub fn push(device: &wgpu::Device) -> Self {
        let out_of_memory = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);
        Self {
            validation,
            out_of_memory,
        }
    }

    /// Pops the scope, returning the first error it caught.
    pub fn finish(self) -> Result<(), wgpu::Error> {
        let Self {
            validation,
            out_of_memory,
        } = self;
        let validation = pollster::block_on(validation.pop());
        let out_of_memory = pollster::block_on(out_of_memory.pop());
        match validation.or(out_of_memory) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
