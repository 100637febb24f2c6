use bytemuck::{Pod, Zeroable};
use preview::Uniforms;

/// CPU mirror of the `PreviewParams` std140 block declared by the fragment
/// header. Field order and padding must stay in sync with `compile.rs`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct PreviewUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub dim: f32,
    pub frame: i32,
    pub padding: [f32; 3],
}

impl PreviewUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            resolution: [width.max(1) as f32, height.max(1) as f32],
            time: 0.0,
            dim: 1.0,
            frame: 0,
            padding: [0.0; 3],
        }
    }

    pub fn update(&mut self, uniforms: &Uniforms) {
        self.resolution = [
            uniforms.resolution_width as f32,
            uniforms.resolution_height as f32,
        ];
        self.time = uniforms.time as f32;
        self.dim = uniforms.dim;
        self.frame = uniforms.frame.min(i32::MAX as u64) as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_is_std140_sized() {
        assert_eq!(std::mem::size_of::<PreviewUniforms>(), 32);
        assert_eq!(std::mem::size_of::<PreviewUniforms>() % 16, 0);
    }

    #[test]
    fn update_copies_frame_inputs() {
        let mut block = PreviewUniforms::new(0, 0);
        assert_eq!(block.resolution, [1.0, 1.0]);

        block.update(&Uniforms {
            time: 1.5,
            resolution_width: 800,
            resolution_height: 600,
            frame: u64::MAX,
            dim: 0.5,
        });
        assert_eq!(block.resolution, [800.0, 600.0]);
        assert_eq!(block.time, 1.5);
        assert_eq!(block.dim, 0.5);
        assert_eq!(block.frame, i32::MAX);
    }

    #[test]
    fn bytes_follow_field_order() {
        let mut block = PreviewUniforms::new(640, 360);
        block.time = 2.0;
        let bytes = bytemuck::bytes_of(&block);
        assert_eq!(&bytes[0..4], &640.0f32.to_ne_bytes());
        assert_eq!(&bytes[8..12], &2.0f32.to_ne_bytes());
    }
}
