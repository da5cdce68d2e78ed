//! Opaque class tree service.
//!
//! The pipeline never looks inside a class. Hosts that work on a parsed
//! representation plug a [`ClassCodec`] in; everything else uses
//! [`RawCodec`], whose tree is the byte buffer itself.

pub trait ClassCodec: Send + Sync {
    type Tree: Send + 'static;

    fn parse(&self, class: &str, bytes: &[u8]) -> anyhow::Result<Self::Tree>;

    fn emit(&self, class: &str, tree: &Self::Tree) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl ClassCodec for RawCodec {
    type Tree = Vec<u8>;

    fn parse(&self, _class: &str, bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    fn emit(&self, _class: &str, tree: &Vec<u8>) -> anyhow::Result<Vec<u8>> {
        Ok(tree.clone())
    }
}
