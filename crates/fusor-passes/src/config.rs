//! Target configuration for the fusion passes.

/// Which fused operations the compilation target provides.
///
/// Passed explicitly into every pass entry point; the engine keeps no
/// ambient target state. A pass whose capability is absent returns
/// without inspecting the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetConfig {
    sad_fusion: bool,
}

impl TargetConfig {
    /// A target with no fused operations.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Enables or disables the fused SAD primitive.
    pub fn with_sad_fusion(mut self, enabled: bool) -> Self {
        self.sad_fusion = enabled;
        self
    }

    /// Returns true when the target provides the fused SAD primitive.
    pub fn has_sad_fusion(&self) -> bool {
        self.sad_fusion
    }
}
