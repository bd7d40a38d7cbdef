//! Client-side context: key generation, encryption and decryption
//!
//! The client owns the secret key and produces the [`PublicKeySet`] the
//! server evaluates with. Only the rotations the server will perform need
//! keys; the set comes from [`crate::rotations::plan_rotations`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal};

use super::ckks::Ciphertext;
use super::keys::{
    galois_element_for_rotation, PublicKey, PublicKeySet, RelinearizationKey, RotationKey,
    RotationKeys, SecretKey,
};
use crate::core::{HennError, Result};
use crate::packing;
use crate::params::CkksParams;

/// Client context bound to one secret key
pub struct SimContext {
    params: CkksParams,
    rng: ChaCha20Rng,
    secret_key: SecretKey,
    public_key: PublicKey,
    relin_key: RelinearizationKey,
    rotation_keys: RotationKeys,
}

impl SimContext {
    /// Generate fresh keys from OS entropy
    pub fn new(params: CkksParams) -> Result<Self> {
        Self::from_rng(params, ChaCha20Rng::from_entropy())
    }

    /// Generate keys deterministically from `seed`
    pub fn with_seed(params: CkksParams, seed: u64) -> Result<Self> {
        Self::from_rng(params, ChaCha20Rng::seed_from_u64(seed))
    }

    fn from_rng(params: CkksParams, mut rng: ChaCha20Rng) -> Result<Self> {
        params.validate()?;
        let id: u64 = rng.gen();
        tracing::info!(
            n = params.n,
            slots = params.slots(),
            max_level = params.max_level(),
            "generated key pair"
        );
        Ok(Self {
            rotation_keys: RotationKeys::new(params.n),
            params,
            rng,
            secret_key: SecretKey { id },
            public_key: PublicKey { key_id: id },
            relin_key: RelinearizationKey { key_id: id },
        })
    }

    pub fn params(&self) -> &CkksParams {
        &self.params
    }

    pub fn slots(&self) -> usize {
        self.params.slots()
    }

    /// Generate keys for every rotation in `rotations`
    ///
    /// Rotations sharing a Galois element share a key. Returns the number of
    /// keys added.
    pub fn gen_rotation_keys<I>(&mut self, rotations: I) -> usize
    where
        I: IntoIterator<Item = i64>,
    {
        let before = self.rotation_keys.num_keys();
        for k in rotations {
            let galois_element = galois_element_for_rotation(k, self.params.n);
            if self.rotation_keys.get_key(galois_element).is_some() {
                continue;
            }
            tracing::trace!(k, galois_element, "rotation key");
            self.rotation_keys.add_key(RotationKey {
                key_id: self.secret_key.id,
                galois_element,
            });
        }
        let added = self.rotation_keys.num_keys() - before;
        tracing::info!(
            added,
            total = self.rotation_keys.num_keys(),
            "generated rotation keys"
        );
        added
    }

    /// Evaluation keys for the server
    pub fn public_key_set(&self) -> PublicKeySet {
        PublicKeySet {
            params: self.params.clone(),
            public_key: self.public_key,
            relin_key: Some(self.relin_key),
            rotation_keys: self.rotation_keys.clone(),
        }
    }

    /// Encrypt `values` (zero-padded) at the top level and default scale
    pub fn encrypt_floats(&mut self, values: &[f64]) -> Result<Ciphertext> {
        let slots = self.slots();
        if values.len() > slots {
            return Err(HennError::SlotOverflow {
                needed: values.len(),
                slots,
            });
        }

        let scale = self.params.scale;
        let std_dev = self.params.error_std * (self.params.n as f64).sqrt() / scale;
        let noise = Normal::new(0.0, std_dev).map_err(|e| {
            HennError::InvalidParams(format!("noise distribution: {}", e))
        })?;

        let mut slot_values = vec![0.0; slots];
        for (i, slot) in slot_values.iter_mut().enumerate() {
            let v = values.get(i).copied().unwrap_or(0.0);
            *slot = (v * scale).round() / scale + noise.sample(&mut self.rng);
        }

        Ok(Ciphertext {
            values: slot_values,
            level: self.params.max_level(),
            scale,
            degree: 1,
            key_id: self.public_key.key_id,
        })
    }

    pub fn encrypt_ints(&mut self, values: &[i64]) -> Result<Ciphertext> {
        let floats: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        self.encrypt_floats(&floats)
    }

    /// Pack `image` with [`packing::pack`] and encrypt the result
    pub fn encrypt_im2col<T>(
        &mut self,
        image: &[Vec<T>],
        kernel_size: usize,
        stride: usize,
    ) -> Result<Ciphertext>
    where
        T: Copy + Into<f64>,
    {
        let packed: Vec<f64> = packing::pack(image, kernel_size, stride)?
            .into_iter()
            .map(Into::into)
            .collect();
        self.encrypt_floats(&packed)
    }

    /// Decrypt every slot
    pub fn decrypt_floats(&self, ct: &Ciphertext) -> Result<Vec<f64>> {
        if ct.key_id != self.secret_key.id {
            return Err(HennError::KeyMismatch {
                expected: self.secret_key.id,
                found: ct.key_id,
            });
        }
        if ct.degree != 1 {
            return Err(HennError::UnrelinearizedCiphertext(ct.degree));
        }
        Ok(ct.values.clone())
    }

    /// Decrypt and round every slot to the nearest integer
    pub fn decrypt_ints(&self, ct: &Ciphertext) -> Result<Vec<i64>> {
        Ok(self
            .decrypt_floats(ct)?
            .into_iter()
            .map(|v| v.round() as i64)
            .collect())
    }
}
