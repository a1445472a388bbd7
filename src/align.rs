use crate::block::DSIZE;

/// Rounds `$value` up to the next multiple of `$align`.
///
/// `$align` must be a power of two.
///
/// # Examples
///
/// ```rust
/// use exalloc::align_to;
///
/// assert_eq!(align_to!(13, 8), 16);
/// assert_eq!(align_to!(16, 8), 16);
/// assert_eq!(align_to!(1, 16), 16);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Adjusts a payload request to a full block size: payload plus room for
/// both boundary tags, rounded up to the double-word unit.
///
/// Requests of up to one double word take the minimum block size, so a
/// free block can always hold its two link words. Returns `None` when the
/// request is large enough to overflow the size arithmetic.
pub(crate) fn adjust_request(size: usize) -> Option<usize> {
  if size <= DSIZE {
    Some(2 * DSIZE)
  } else {
    size.checked_add(2 * DSIZE - 1).map(|v| v & !(DSIZE - 1))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align_to() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (DSIZE * i + 1)..=(DSIZE * (i + 1));

      let expected_alignment = DSIZE * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align_to!(size, DSIZE));
      }
    }
  }

  #[test]
  fn test_adjust_request() {
    // Anything that fits in one double word takes the minimum block.
    assert_eq!(adjust_request(1), Some(2 * DSIZE));
    assert_eq!(adjust_request(DSIZE), Some(2 * DSIZE));

    // Larger requests round up with room for header and footer.
    assert_eq!(adjust_request(DSIZE + 1), Some(3 * DSIZE));
    assert_eq!(adjust_request(3 * DSIZE), Some(4 * DSIZE));
    assert_eq!(adjust_request(100), Some(align_to!(100 + DSIZE, DSIZE)));
  }

  #[test]
  fn test_adjust_request_overflow() {
    assert_eq!(adjust_request(usize::MAX), None);
    assert_eq!(adjust_request(usize::MAX - DSIZE), None);
  }
}
