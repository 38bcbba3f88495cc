// crates/spacetime-post-proof/src/signer.rs

//! Abstract signing seam: block construction and the signature scheme
//! live downstream of this core and are never implemented here. This
//! trait exists only so tests and documentation have something concrete
//! to name.

/// A miner's signing identity, as an external collaborator.
pub trait Signer {
    /// The public key this signer signs on behalf of.
    fn public_key(&self) -> [u8; 32];
    /// Sign an arbitrary message.
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

#[cfg(test)]
pub(crate) struct NullSigner {
    pub pubkey: [u8; 32],
}

#[cfg(test)]
impl Signer for NullSigner {
    fn public_key(&self) -> [u8; 32] {
        self.pubkey
    }

    fn sign(&self, _message: &[u8]) -> Vec<u8> {
        Vec::new()
    }
}
