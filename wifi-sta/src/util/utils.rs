//! Small helpers shared by the client and the driver seams.

/// Copies `src` into a zero-padded fixed-size array.
///
/// Returns `None` if `src` does not fit.
pub(crate) fn copy_bounded<const N: usize>(src: &[u8]) -> Option<[u8; N]> {
    if src.len() > N {
        return None;
    }
    let mut buf = [0u8; N];
    buf[..src.len()].copy_from_slice(src);
    Some(buf)
}

/// Logs the error of a driver call that must not be escalated.
///
/// Used on the event-loop thread, where there is no caller to return an
/// error to.
#[macro_export]
#[doc(hidden)]
macro_rules! log_err {
    ($result:expr, $context:expr) => {
        if let Err(e) = $result {
            log::error!("{}: {}", $context, e);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_bounded_pads_with_zeros() {
        let buf = copy_bounded::<8>(b"abc").unwrap();
        assert_eq!(&buf, b"abc\0\0\0\0\0");
    }

    #[test]
    fn copy_bounded_exact_fit() {
        let buf = copy_bounded::<3>(b"abc").unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn copy_bounded_too_long() {
        assert!(copy_bounded::<2>(b"abc").is_none());
    }

    #[test]
    fn copy_bounded_empty() {
        assert_eq!(copy_bounded::<4>(b""), Some([0u8; 4]));
    }
}
