// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexSpaces.
//
// PlexSpaces is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexSpaces is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexSpaces. If not, see <https://www.gnu.org/licenses/>.

//! Lease value generation.

use crate::LockResult;
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;

/// Function type producing a fresh lease value per acquisition attempt.
pub type GenValueFn = dyn Fn() -> LockResult<String> + Send + Sync;

/// Generate a random lease value.
///
/// 16 bytes of cryptographic-quality randomness, standard base64 encoded
/// (24 characters). The value identifies one acquisition and must be
/// unguessable so conditional delete/extend cannot be forged by another
/// client.
pub fn gen_value() -> LockResult<String> {
    let mut buf = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut buf);
    Ok(general_purpose::STANDARD.encode(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_gen_value_length() {
        let value = gen_value().unwrap();
        assert_eq!(value.len(), 24);
    }

    #[test]
    fn test_gen_value_unique() {
        let values: HashSet<String> = (0..1000).map(|_| gen_value().unwrap()).collect();
        assert_eq!(values.len(), 1000);
    }
}
