pub mod handle;

pub use handle::{Handle, Pool};

pub const VERSION_MAJOR: u32 = 1;
pub const VERSION_MINOR: u32 = 0;
pub const VERSION_PATCH: u32 = 0;

/// Wait forever in fence and acquire calls.
pub const TIMEOUT_INFINITE: u64 = u64::MAX;

/// Pack a version the same way Vulkan does.
pub const fn make_version(major: u32, minor: u32, patch: u32) -> u32 {
    (major << 22) | (minor << 12) | patch
}

/// Version of this crate packed with [`make_version`].
pub const fn version() -> u32 {
    make_version(VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}

/// Round `value` up to a multiple of `alignment` (a power of two).
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + (alignment - 1)) & !(alignment - 1)
}

/// Round `value` down to a multiple of `alignment` (a power of two).
pub fn align_down(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    value & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_down(255, 4), 252);
        assert_eq!(align_down(256, 4), 256);
    }

    #[test]
    fn version_packing() {
        assert_eq!(make_version(1, 0, 0), 1 << 22);
        assert_eq!(make_version(1, 2, 3), (1 << 22) | (2 << 12) | 3);
        assert_eq!(version(), make_version(1, 0, 0));
    }
}
