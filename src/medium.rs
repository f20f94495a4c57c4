//! The medium abstraction: a named table of atomic codecs plus a packing
//! transform between the wire representation and the unpacked value tree.
//!
//! A medium says nothing about structure; descriptors drive the recursion and
//! consult the medium only at atomic leaves. Mediums without a real wire form
//! (native values, pre-parsed JSON trees) use an identity packing.

use crate::ty::Atomic;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Transcode one atomic value. May fail; the message becomes an issue at the
/// current path.
pub type CodecFn = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// Encode/decode pair for one atomic category in one medium.
#[derive(Clone)]
pub struct AtomicCodec {
    pub encode: CodecFn,
    pub decode: CodecFn,
}

impl AtomicCodec {
    pub fn new(
        encode: impl Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
        decode: impl Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        AtomicCodec {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }

    /// Pass-through codec; the engine still checks the atomic kind after
    /// decoding, so identity is safe for in-memory mediums.
    pub fn identity() -> Self {
        AtomicCodec::new(|v| Ok(v.clone()), |v| Ok(v.clone()))
    }
}

/// Transform between the packed wire form `P` and the unpacked value tree.
pub struct Packing<P> {
    pub pack: Arc<dyn Fn(&Value) -> Result<P, String> + Send + Sync>,
    pub unpack: Arc<dyn Fn(&P) -> Result<Value, String> + Send + Sync>,
}

impl<P> Clone for Packing<P> {
    fn clone(&self) -> Self {
        Packing {
            pack: self.pack.clone(),
            unpack: self.unpack.clone(),
        }
    }
}

/// A named wire representation: atomic codec table plus packing.
pub struct Medium<P = Value> {
    name: String,
    codecs: HashMap<Atomic, AtomicCodec>,
    packing: Packing<P>,
}

impl<P> Clone for Medium<P> {
    fn clone(&self) -> Self {
        Medium {
            name: self.name.clone(),
            codecs: self.codecs.clone(),
            packing: self.packing.clone(),
        }
    }
}

impl Medium<Value> {
    /// A medium whose packed and unpacked representations are identical.
    pub fn new(name: impl Into<String>) -> Self {
        Medium {
            name: name.into(),
            codecs: HashMap::new(),
            packing: Packing {
                pack: Arc::new(|v: &Value| Ok(v.clone())),
                unpack: Arc::new(|v: &Value| Ok(v.clone())),
            },
        }
    }
}

impl<P> Medium<P> {
    /// A medium with a real wire form.
    pub fn with_packing(
        name: impl Into<String>,
        pack: impl Fn(&Value) -> Result<P, String> + Send + Sync + 'static,
        unpack: impl Fn(&P) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        Medium {
            name: name.into(),
            codecs: HashMap::new(),
            packing: Packing {
                pack: Arc::new(pack),
                unpack: Arc::new(unpack),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register (or override) the codec for one atomic category.
    pub fn with_codec(mut self, atom: Atomic, codec: AtomicCodec) -> Self {
        self.codecs.insert(atom, codec);
        self
    }

    /// Look up the codec for an atomic category.
    ///
    /// A missing codec is a schema/medium authoring error, not a per-value
    /// issue, and panics.
    pub fn codec(&self, atom: Atomic) -> &AtomicCodec {
        self.codecs.get(&atom).unwrap_or_else(|| {
            panic!(
                "Unknown codec symbol {:?} for medium {:?}",
                atom.name(),
                self.name
            )
        })
    }

    /// New medium layering further codecs onto this one's table, reusing its
    /// packing. Override codecs (or swap atoms) with [`Medium::with_codec`].
    pub fn extend(&self, name: impl Into<String>) -> Medium<P> {
        Medium {
            name: name.into(),
            codecs: self.codecs.clone(),
            packing: self.packing.clone(),
        }
    }

    pub(crate) fn unpack(&self, packed: &P) -> Result<Value, String> {
        (self.packing.unpack)(packed)
    }

    pub(crate) fn pack(&self, unpacked: &Value) -> Result<P, String> {
        (self.packing.pack)(unpacked)
    }
}
