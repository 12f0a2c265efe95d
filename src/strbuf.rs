//! Stack-first growable string builder, used everywhere this crate would
//! otherwise reach for `format!`/`String` concatenation on the signing and
//! URL-encoding hot paths (spec.md §4.1).
//!
//! A [`GrowableStringBuffer`] starts out backed by a fixed-size inline
//! array. Only once an append would overflow that inline span does it rent
//! a buffer from a [`crate::pool::BufferPool`] — and from then on, doubles
//! (capped at `i32::MAX`) rather than growing by the append size alone.

use crate::pool::BufferPool;

/// Inline capacity before the buffer falls back to a pooled allocation.
/// Large enough to hold a typical canonical request's header block without
/// ever touching the pool.
const INLINE_CAP: usize = 256;

enum Storage {
    Inline { buf: [u8; INLINE_CAP], len: usize },
    Pooled { buf: Vec<u8> },
}

pub struct GrowableStringBuffer<'p> {
    pool: &'p dyn BufferPool,
    storage: Storage,
}

impl<'p> GrowableStringBuffer<'p> {
    pub fn new(pool: &'p dyn BufferPool) -> Self {
        GrowableStringBuffer {
            pool,
            storage: Storage::Inline {
                buf: [0u8; INLINE_CAP],
                len: 0,
            },
        }
    }

    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Inline { len, .. } => *len,
            Storage::Pooled { buf } => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_str(&self) -> &str {
        let bytes = match &self.storage {
            Storage::Inline { buf, len } => &buf[..*len],
            Storage::Pooled { buf } => buf.as_slice(),
        };
        // SAFETY-free: every append goes through `append_str`/`append_char`,
        // both of which only ever push valid UTF-8.
        std::str::from_utf8(bytes).expect("GrowableStringBuffer only ever holds valid UTF-8")
    }

    fn reserve(&mut self, additional: usize) {
        let needed = self.len() + additional;
        match &mut self.storage {
            Storage::Inline { buf, len } => {
                if needed <= INLINE_CAP {
                    return;
                }
                let new_cap = needed.max((INLINE_CAP * 2).min(i32::MAX as usize));
                let mut pooled = self.pool.rent(new_cap);
                pooled.extend_from_slice(&buf[..*len]);
                self.storage = Storage::Pooled { buf: pooled };
            }
            Storage::Pooled { buf } => {
                if buf.capacity() - buf.len() >= additional {
                    return;
                }
                let new_cap = needed.max((buf.capacity() * 2).min(i32::MAX as usize));
                let mut pooled = self.pool.rent(new_cap);
                pooled.extend_from_slice(buf);
                let old = std::mem::replace(buf, pooled);
                self.pool.return_buf(old);
            }
        }
    }

    pub fn append_str(&mut self, s: &str) {
        self.reserve(s.len());
        match &mut self.storage {
            Storage::Inline { buf, len } => {
                buf[*len..*len + s.len()].copy_from_slice(s.as_bytes());
                *len += s.len();
            }
            Storage::Pooled { buf } => buf.extend_from_slice(s.as_bytes()),
        }
    }

    pub fn append_char(&mut self, c: char) {
        let mut tmp = [0u8; 4];
        self.append_str(c.encode_utf8(&mut tmp));
    }

    /// Appends the decimal representation of `v` using a small stack
    /// scratch buffer — no intermediate `String` allocation.
    pub fn append_u64(&mut self, v: u64) {
        let mut scratch = [0u8; 20]; // u64::MAX has 20 digits
        let mut i = scratch.len();
        let mut v = v;
        if v == 0 {
            self.append_str("0");
            return;
        }
        while v > 0 {
            i -= 1;
            scratch[i] = b'0' + (v % 10) as u8;
            v /= 10;
        }
        self.append_str(std::str::from_utf8(&scratch[i..]).unwrap());
    }

    pub fn append_u32(&mut self, v: u32) {
        self.append_u64(v as u64);
    }

    /// Drops the trailing character, if any — used to trim a trailing `&`
    /// after building a `&`-joined list.
    pub fn remove_last(&mut self) {
        let s = self.as_str();
        if let Some(last) = s.chars().next_back() {
            let new_len = s.len() - last.len_utf8();
            match &mut self.storage {
                Storage::Inline { len, .. } => *len = new_len,
                Storage::Pooled { buf } => buf.truncate(new_len),
            }
        }
    }

    /// Materializes the accumulated content and returns any pooled array.
    pub fn finish(self) -> String {
        match self.storage {
            Storage::Inline { buf, len } => {
                String::from_utf8(buf[..len].to_vec()).expect("valid UTF-8")
            }
            Storage::Pooled { buf } => {
                let s = String::from_utf8(buf.clone()).expect("valid UTF-8");
                self.pool.return_buf(buf);
                s
            }
        }
    }
}

impl Drop for GrowableStringBuffer<'_> {
    fn drop(&mut self) {
        if let Storage::Pooled { buf } = std::mem::replace(
            &mut self.storage,
            Storage::Inline {
                buf: [0u8; INLINE_CAP],
                len: 0,
            },
        ) {
            self.pool.return_buf(buf);
        }
    }
}
