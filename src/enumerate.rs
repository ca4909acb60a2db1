// Enumerate - two-phase "query count, then fill" enumeration

use ash::vk;

/// Copies as much of `src` as fits into `dst`.
///
/// Returns the number of elements written, and `INCOMPLETE` when `dst` was
/// too small to hold everything.
pub fn fill<T: Copy>(src: &[T], dst: &mut [T]) -> (usize, vk::Result) {
    let written = src.len().min(dst.len());
    dst[..written].copy_from_slice(&src[..written]);
    let result = if written < src.len() {
        vk::Result::INCOMPLETE
    } else {
        vk::Result::SUCCESS
    };
    (written, result)
}

/// Implements the C side of two-phase enumeration.
///
/// With a null `p_out`, stores the available count. Otherwise reads the
/// capacity from `*p_count`, fills what fits and stores the number written.
///
/// # Safety
/// `p_count` must be null or valid for reads and writes. When `p_out` is
/// non-null it must be valid for `*p_count` writes of `T`.
pub unsafe fn write_counted<T: Copy>(src: &[T], p_count: *mut u32, p_out: *mut T) -> vk::Result {
    let Some(count) = p_count.as_mut() else {
        return vk::Result::ERROR_VALIDATION_FAILED_EXT;
    };
    if p_out.is_null() {
        *count = src.len() as u32;
        return vk::Result::SUCCESS;
    }

    let dst = std::slice::from_raw_parts_mut(p_out, *count as usize);
    let (written, result) = fill(src, dst);
    *count = written as u32;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn null_buffer_reports_count_only() {
        let src = [1u32, 2, 3];
        let mut count = 0;
        let result = unsafe { write_counted(&src, &mut count, ptr::null_mut()) };
        assert_eq!(result, vk::Result::SUCCESS);
        assert_eq!(count, 3);

        let mut again = 0;
        unsafe { write_counted(&src, &mut again, ptr::null_mut()) };
        assert_eq!(again, count);
    }

    #[test]
    fn exact_buffer_is_filled_completely() {
        let src = [7u64, 8];
        let mut out = [0u64; 2];
        let mut count = 2;
        let result = unsafe { write_counted(&src, &mut count, out.as_mut_ptr()) };
        assert_eq!(result, vk::Result::SUCCESS);
        assert_eq!(count, 2);
        assert_eq!(out, src);
    }

    #[test]
    fn short_buffer_is_truncated_and_incomplete() {
        let src = [1u8, 2, 3, 4];
        let mut out = [0u8; 4];
        let mut count = 3;
        let result = unsafe { write_counted(&src, &mut count, out.as_mut_ptr()) };
        assert_eq!(result, vk::Result::INCOMPLETE);
        assert_eq!(count, 3);
        assert_eq!(out, [1, 2, 3, 0]);
    }

    #[test]
    fn oversized_buffer_reports_elements_written() {
        let src = [5i32];
        let mut out = [0i32; 4];
        let (written, result) = fill(&src, &mut out);
        assert_eq!((written, result), (1, vk::Result::SUCCESS));
    }

    #[test]
    fn empty_source_with_zero_capacity_succeeds() {
        let src: [u32; 0] = [];
        let mut out = [0u32; 1];
        let mut count = 0;
        let result = unsafe { write_counted(&src, &mut count, out.as_mut_ptr()) };
        assert_eq!(result, vk::Result::SUCCESS);
        assert_eq!(count, 0);
    }

    #[test]
    fn null_count_is_rejected() {
        let result = unsafe { write_counted(&[1u32], ptr::null_mut(), ptr::null_mut()) };
        assert_eq!(result, vk::Result::ERROR_VALIDATION_FAILED_EXT);
    }
}
