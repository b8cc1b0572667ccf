//! Result of key generation and key refresh
//!
//! The config is the only artifact a party has to persist between protocol runs. It holds the secret share of the party
//! and the public data of every party which took part in key generation.
use crate::algorithms::pedersen::PedersenParameters;
use crate::ecdsa::{lagrange_coefficient, sum_points, PaillierKeys};
use crate::protocol::PartyId;
use crate::Error;
use curv::elliptic::curves::traits::ECPoint;
use curv::{FE, GE};
use paillier::EncryptionKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use trace::trace;
use zeroize::Zeroize;

/// Public data of a party
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicShare {
    /// evaluation point of the share of the party
    pub point: usize,
    /// $` X_j = x_j \cdot G `$
    pub ecdsa: GE,
    pub paillier: EncryptionKey,
    pub pedersen: PedersenParameters,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    pub id: PartyId,
    pub threshold: usize,
    /// secret share $` x_i `$
    pub ecdsa: FE,
    pub paillier: PaillierKeys,
    pub public_key: GE,
    pub public: BTreeMap<PartyId, PublicShare>,
    /// common random string agreed during key generation
    pub rid: Vec<u8>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("id", &self.id)
            .field("threshold", &self.threshold)
            .field("ecdsa", &"[***]".to_owned())
            .field("paillier", &self.paillier)
            .field("public_key", &self.public_key)
            .field("parties", &self.public.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Drop for Config {
    fn drop(&mut self) {
        self.ecdsa.zeroize();
    }
}

impl Config {
    /// sorted ids of all parties of the key
    pub fn party_ids(&self) -> Vec<PartyId> {
        self.public.keys().cloned().collect()
    }

    pub fn public_share(&self, party: &PartyId) -> Result<&PublicShare, Error> {
        self.public
            .get(party)
            .ok_or_else(|| Error::Protocol(format!("party {} does not hold a share of the key", party)))
    }

    /// Lagrange coefficient of `party` for the set of signers
    pub fn lagrange(&self, signers: &[PartyId], party: &PartyId) -> Result<FE, Error> {
        let points = signers
            .iter()
            .map(|id| self.public_share(id).map(|share| share.point))
            .collect::<Result<Vec<_>, _>>()?;
        let own_point = self.public_share(party)?.point;
        Ok(lagrange_coefficient(&points, own_point))
    }

    /// Checks consistency of the config
    ///
    /// The public key has to be interpolated from the public shares of any `threshold + 1` parties.
    /// Two such sets are checked: the first and the last parties in the order of ids.
    #[trace(pretty, prefix = "Config::")]
    pub fn validate(&self) -> Result<(), Error> {
        let n = self.public.len();
        if self.threshold < 1 || self.threshold >= n {
            return Err(Error::Protocol(format!(
                "threshold {} is incompatible with {} parties",
                self.threshold, n
            )));
        }
        let own = self.public_share(&self.id)?;
        if GE::generator() * self.ecdsa != own.ecdsa {
            return Err(Error::Protocol(
                "secret share does not match its public counterpart".to_string(),
            ));
        }
        if self.paillier.ek != own.paillier
            || !PaillierKeys::is_valid(&self.paillier.ek, &self.paillier.dk)
        {
            return Err(Error::Protocol("invalid Paillier keys".to_string()));
        }

        let mut points = self.public.values().map(|share| share.point).collect::<Vec<_>>();
        points.sort_unstable();
        if points != (1..=n).collect::<Vec<_>>() {
            return Err(Error::Protocol(format!(
                "evaluation points {:?} are not 1..{}",
                points, n
            )));
        }
        for (party, share) in &self.public {
            if !share.pedersen.is_valid() || share.pedersen.n != share.paillier.n {
                return Err(Error::Protocol(format!(
                    "invalid Ring-Pedersen parameters of {}",
                    party
                )));
            }
        }

        let ids = self.party_ids();
        let signers = self.threshold + 1;
        for subset in &[&ids[..signers], &ids[n - signers..]] {
            if self.interpolate_public_key(subset)? != self.public_key {
                return Err(Error::Protocol(format!(
                    "public key cannot be interpolated from the shares of {:?}",
                    subset
                )));
            }
        }
        Ok(())
    }

    fn interpolate_public_key(&self, signers: &[PartyId]) -> Result<GE, Error> {
        let terms = signers
            .iter()
            .map(|id| -> Result<GE, Error> {
                Ok(self.public_share(id)?.ecdsa * self.lagrange(signers, id)?)
            })
            .collect::<Result<Vec<GE>, Error>>()?;
        sum_points(&terms).ok_or_else(|| Error::Protocol("empty set of signers".to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Protocol(format!("cannot encode config: {}", e)))
    }

    /// decodes and validates the config
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let config: Self = serde_json::from_slice(bytes)
            .map_err(|e| Error::Protocol(format!("cannot decode config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// $` \lambda_i x_i `$ for the given set of signers
    pub(crate) fn additive_share(&self, signers: &[PartyId]) -> Result<FE, Error> {
        Ok(self.lagrange(signers, &self.id)? * self.ecdsa)
    }
}
