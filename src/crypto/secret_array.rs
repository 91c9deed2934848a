//! A fixed-length, zero-on-drop byte buffer.
//!
//! Wraps `secrets::SecretVec` with a compile-time length: allocate zeroed,
//! mutate through a closure that receives a live buffer, read the result
//! out as an owned array when needed.

use secrets::SecretVec;

pub struct SecretArray<const N: usize> {
    inner: SecretVec<u8>,
}

impl<const N: usize> SecretArray<N> {
    pub fn zero() -> Self {
        SecretArray {
            inner: SecretVec::zero(N),
        }
    }

    pub fn from_slice(data: &[u8; N]) -> Self {
        let mut array = Self::zero();
        array.with_buf_mut(|buf| buf.copy_from_slice(data));
        array
    }

    pub fn with_buf_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut borrow = self.inner.borrow_mut();
        f(&mut borrow[..N])
    }

    pub fn as_array(&self) -> [u8; N] {
        let borrow = self.inner.borrow();
        let mut out = [0u8; N];
        out.copy_from_slice(&borrow[..N]);
        out
    }
}
