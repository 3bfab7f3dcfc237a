//! Runtime dispatch onto the `block-padding` schemes.

use aes::cipher::generic_array::{typenum::U16, GenericArray};
use block_padding::{AnsiX923, Iso10126, Iso7816, Padding, Pkcs7};
use common::{PaddingScheme, BLOCK_SIZE};

use crate::engine::EngineError;

/// Pad `block` in place; bytes `[..pos]` are data.
pub(super) fn pad(scheme: PaddingScheme, block: &mut [u8; BLOCK_SIZE], pos: usize) {
    let block = GenericArray::<u8, U16>::from_mut_slice(block);
    match scheme {
        PaddingScheme::None => {}
        PaddingScheme::Pkcs7 | PaddingScheme::Pkcs5 => <Pkcs7 as Padding<U16>>::pad(block, pos),
        PaddingScheme::Iso10126_2 => <Iso10126 as Padding<U16>>::pad(block, pos),
        PaddingScheme::X9_23 => <AnsiX923 as Padding<U16>>::pad(block, pos),
        PaddingScheme::Iso7816_4 => <Iso7816 as Padding<U16>>::pad(block, pos),
    }
}

/// Strip padding from a decrypted final block.
pub(super) fn unpad(scheme: PaddingScheme, block: &[u8; BLOCK_SIZE]) -> Result<&[u8], EngineError> {
    let block = GenericArray::<u8, U16>::from_slice(block);
    let unpadded = match scheme {
        PaddingScheme::None => Ok(block.as_slice()),
        PaddingScheme::Pkcs7 | PaddingScheme::Pkcs5 => <Pkcs7 as Padding<U16>>::unpad(block),
        PaddingScheme::Iso10126_2 => <Iso10126 as Padding<U16>>::unpad(block),
        PaddingScheme::X9_23 => <AnsiX923 as Padding<U16>>::unpad(block),
        PaddingScheme::Iso7816_4 => <Iso7816 as Padding<U16>>::unpad(block),
    };
    unpadded.map_err(|_| EngineError::BadPadding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkcs7_fills_with_length() {
        let mut block = [0xAAu8; BLOCK_SIZE];
        pad(PaddingScheme::Pkcs7, &mut block, 12);
        assert_eq!(&block[12..], &[4, 4, 4, 4]);
        assert_eq!(unpad(PaddingScheme::Pkcs7, &block).unwrap(), &[0xAA; 12]);
    }

    #[test]
    fn iso7816_marks_boundary() {
        let mut block = [0x11u8; BLOCK_SIZE];
        pad(PaddingScheme::Iso7816_4, &mut block, 5);
        assert_eq!(block[5], 0x80);
        assert!(block[6..].iter().all(|b| *b == 0));
        assert_eq!(unpad(PaddingScheme::Iso7816_4, &block).unwrap().len(), 5);
    }

    #[test]
    fn every_scheme_is_invertible() {
        for scheme in PaddingScheme::ALL {
            for pos in 0..BLOCK_SIZE {
                let mut block = [0x5Cu8; BLOCK_SIZE];
                pad(scheme, &mut block, pos);
                let expected = if scheme.is_none() { BLOCK_SIZE } else { pos };
                assert_eq!(unpad(scheme, &block).unwrap().len(), expected, "{scheme} at {pos}");
            }
        }
    }

    #[test]
    fn corrupted_padding_rejected() {
        let mut block = [0u8; BLOCK_SIZE];
        block[BLOCK_SIZE - 1] = 0x20;
        assert_eq!(unpad(PaddingScheme::Pkcs7, &block), Err(EngineError::BadPadding));
    }
}
