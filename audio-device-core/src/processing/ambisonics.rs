//! Ambisonic channel definitions and conversion tables.
//!
//! All tables are indexed by ACN channel index. A frame authored in another
//! convention is imported with
//! `out[acn] = in[ordering.source_index(acn)] * normalization.scales()[acn]`.

/// Highest ambisonic order supported for device output.
pub const MAX_AMBI_ORDER: u8 = 3;

/// Coefficients of a full-sphere field of `MAX_AMBI_ORDER`.
pub const MAX_AMBI_COEFFS: usize = ambi_channel_count(MAX_AMBI_ORDER);

/// Coefficients of a horizontal-only field of `MAX_AMBI_ORDER`.
pub const MAX_AMBI_2D_COEFFS: usize = MAX_AMBI_ORDER as usize * 2 + 1;

pub const AMBI_0ORDER_MASK: u32 = 0x0000_0001;
pub const AMBI_1ORDER_MASK: u32 = 0x0000_000f;
pub const AMBI_2ORDER_MASK: u32 = 0x0000_01ff;
pub const AMBI_3ORDER_MASK: u32 = 0x0000_ffff;
pub const AMBI_4ORDER_MASK: u32 = 0x01ff_ffff;

/// ACN channels with a height component.
pub const AMBI_PERIPHONIC_MASK: u32 = 0x00fe_7ce4;

/// Number of coefficients in a full-sphere field of the given order.
pub const fn ambi_channel_count(order: u8) -> usize {
    let n = order as usize + 1;
    n * n
}

/// N3D input needs no rescaling.
pub const N3D_TO_N3D: [f32; MAX_AMBI_COEFFS] = [1.0; MAX_AMBI_COEFFS];

pub const SN3D_TO_N3D: [f32; MAX_AMBI_COEFFS] = [
    1.000000000, // ACN  0 (W), sqrt(1)
    1.732050808, // ACN  1 (Y), sqrt(3)
    1.732050808, // ACN  2 (Z), sqrt(3)
    1.732050808, // ACN  3 (X), sqrt(3)
    2.236067978, // ACN  4 (V), sqrt(5)
    2.236067978, // ACN  5 (T), sqrt(5)
    2.236067978, // ACN  6 (R), sqrt(5)
    2.236067978, // ACN  7 (S), sqrt(5)
    2.236067978, // ACN  8 (U), sqrt(5)
    2.645751311, // ACN  9 (Q), sqrt(7)
    2.645751311, // ACN 10 (O), sqrt(7)
    2.645751311, // ACN 11 (M), sqrt(7)
    2.645751311, // ACN 12 (K), sqrt(7)
    2.645751311, // ACN 13 (L), sqrt(7)
    2.645751311, // ACN 14 (N), sqrt(7)
    2.645751311, // ACN 15 (P), sqrt(7)
];

pub const FUMA_TO_N3D: [f32; MAX_AMBI_COEFFS] = [
    1.414213562, // ACN  0 (W), sqrt(2)
    1.732050808, // ACN  1 (Y), sqrt(3)
    1.732050808, // ACN  2 (Z), sqrt(3)
    1.732050808, // ACN  3 (X), sqrt(3)
    1.936491673, // ACN  4 (V), sqrt(15)/2
    1.936491673, // ACN  5 (T), sqrt(15)/2
    2.236067978, // ACN  6 (R), sqrt(5)
    1.936491673, // ACN  7 (S), sqrt(15)/2
    1.936491673, // ACN  8 (U), sqrt(15)/2
    2.091650066, // ACN  9 (Q), sqrt(35/8)
    1.972026594, // ACN 10 (O), sqrt(35)/3
    2.231093404, // ACN 11 (M), sqrt(224/45)
    2.645751311, // ACN 12 (K), sqrt(7)
    2.231093404, // ACN 13 (L), sqrt(224/45)
    1.972026594, // ACN 14 (N), sqrt(35)/3
    2.091650066, // ACN 15 (P), sqrt(35/8)
];

/// ACN channel fed by each FuMa channel.
pub const FUMA_TO_ACN: [usize; MAX_AMBI_COEFFS] = [
    0,  // W
    3,  // X
    1,  // Y
    2,  // Z
    6,  // R
    7,  // S
    5,  // T
    8,  // U
    4,  // V
    12, // K
    13, // L
    11, // M
    14, // N
    10, // O
    15, // P
    9,  // Q
];

pub const ACN_TO_ACN: [usize; MAX_AMBI_COEFFS] = {
    let mut table = [0; MAX_AMBI_COEFFS];
    let mut i = 0;
    while i < MAX_AMBI_COEFFS {
        table[i] = i;
        i += 1;
    }
    table
};

/// FuMa channel holding each ACN coefficient.
pub const ACN_TO_FUMA: [usize; MAX_AMBI_COEFFS] = invert(&FUMA_TO_ACN);

const fn invert(table: &[usize; MAX_AMBI_COEFFS]) -> [usize; MAX_AMBI_COEFFS] {
    let mut inverse = [0; MAX_AMBI_COEFFS];
    let mut i = 0;
    while i < MAX_AMBI_COEFFS {
        inverse[table[i]] = i;
        i += 1;
    }
    inverse
}

/// Gain normalization of incoming ambisonic content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmbiNormalization {
    /// Furse-Malham (legacy B-format).
    FuMa,
    /// Schmidt semi-normalized.
    SN3D,
    /// Fully normalized.
    N3D,
}

impl AmbiNormalization {
    /// Per-ACN scale factors converting to N3D.
    pub fn scales(&self) -> &'static [f32; MAX_AMBI_COEFFS] {
        match self {
            Self::FuMa => &FUMA_TO_N3D,
            Self::SN3D => &SN3D_TO_N3D,
            Self::N3D => &N3D_TO_N3D,
        }
    }
}

/// Channel ordering of incoming ambisonic content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmbiOrdering {
    FuMa,
    ACN,
}

impl AmbiOrdering {
    /// Input channel index for each ACN channel.
    pub fn table(&self) -> &'static [usize; MAX_AMBI_COEFFS] {
        match self {
            Self::FuMa => &ACN_TO_FUMA,
            Self::ACN => &ACN_TO_ACN,
        }
    }

    /// Input channel that feeds ACN channel `acn`.
    ///
    /// Panics if `acn >= MAX_AMBI_COEFFS`.
    pub fn source_index(&self, acn: usize) -> usize {
        assert!(acn < MAX_AMBI_COEFFS, "ACN index out of range: {acn}");
        self.table()[acn]
    }
}

/// Import one frame of ambisonic coefficients into ACN/N3D.
///
/// Converts `output.len()` channels. Panics if `output` is longer than
/// `MAX_AMBI_COEFFS` or `input` lacks a channel the ordering refers to.
pub fn convert_frame(
    input: &[f32],
    output: &mut [f32],
    normalization: AmbiNormalization,
    ordering: AmbiOrdering,
) {
    assert!(
        output.len() <= MAX_AMBI_COEFFS,
        "too many ambisonic channels: {}",
        output.len()
    );
    let scales = normalization.scales();
    for (acn, out) in output.iter_mut().enumerate() {
        let src = ordering.source_index(acn);
        assert!(src < input.len(), "input frame lacks channel {src}");
        *out = input[src] * scales[acn];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn coefficient_counts() {
        assert_eq!(ambi_channel_count(0), 1);
        assert_eq!(ambi_channel_count(1), 4);
        assert_eq!(MAX_AMBI_COEFFS, 16);
        assert_eq!(MAX_AMBI_2D_COEFFS, 7);
    }

    #[test]
    fn order_masks_cover_coefficients() {
        let masks = [
            AMBI_0ORDER_MASK,
            AMBI_1ORDER_MASK,
            AMBI_2ORDER_MASK,
            AMBI_3ORDER_MASK,
            AMBI_4ORDER_MASK,
        ];
        for (order, mask) in masks.into_iter().enumerate() {
            assert_eq!(mask.count_ones() as usize, ambi_channel_count(order as u8));
        }
        assert_eq!(AMBI_PERIPHONIC_MASK & AMBI_0ORDER_MASK, 0);
    }

    #[test]
    fn all_scales_are_positive() {
        for norm in [
            AmbiNormalization::FuMa,
            AmbiNormalization::SN3D,
            AmbiNormalization::N3D,
        ] {
            for (acn, scale) in norm.scales().iter().enumerate() {
                assert!(*scale > 0.0, "{norm:?} channel {acn}");
            }
        }
    }

    #[test]
    fn sn3d_scales_follow_order() {
        for acn in 0..MAX_AMBI_COEFFS {
            let order = (acn as f32).sqrt().floor();
            assert_relative_eq!(SN3D_TO_N3D[acn], (2.0 * order + 1.0).sqrt(), epsilon = 1e-6);
        }
    }

    #[test]
    fn fuma_index_table_is_bijection() {
        let mut seen = [false; MAX_AMBI_COEFFS];
        for &idx in FUMA_TO_ACN.iter() {
            assert!(!seen[idx]);
            seen[idx] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn permutation_then_inverse_is_identity() {
        for ordering in [AmbiOrdering::FuMa, AmbiOrdering::ACN] {
            let table = ordering.table();
            let inverse = invert(table);
            for i in 0..MAX_AMBI_COEFFS {
                assert_eq!(inverse[table[i]], i);
                assert_eq!(table[inverse[i]], i);
            }
        }
        for i in 0..MAX_AMBI_COEFFS {
            assert_eq!(ACN_TO_FUMA[FUMA_TO_ACN[i]], i);
        }
    }

    #[test]
    fn converts_first_order_fuma_frame() {
        // FuMa order is W X Y Z.
        let input = [1.0, 0.5, 0.25, 0.125];
        let mut output = [0.0; 4];
        convert_frame(
            &input,
            &mut output,
            AmbiNormalization::FuMa,
            AmbiOrdering::FuMa,
        );

        // ACN order is W Y Z X.
        assert_relative_eq!(output[0], 1.0 * 1.414213562, epsilon = 1e-6);
        assert_relative_eq!(output[1], 0.25 * 1.732050808, epsilon = 1e-6);
        assert_relative_eq!(output[2], 0.125 * 1.732050808, epsilon = 1e-6);
        assert_relative_eq!(output[3], 0.5 * 1.732050808, epsilon = 1e-6);
    }

    #[test]
    fn fuma_ordering_reads_matching_labels() {
        // FuMa order is W X Y Z R S T U V.
        let fuma = ['W', 'X', 'Y', 'Z', 'R', 'S', 'T', 'U', 'V'];
        let acn = ['W', 'Y', 'Z', 'X', 'V', 'T', 'R', 'S', 'U'];
        for (index, label) in acn.iter().enumerate() {
            assert_eq!(fuma[AmbiOrdering::FuMa.source_index(index)], *label, "ACN {index}");
        }
        assert_eq!(FUMA_TO_ACN[ACN_TO_FUMA[4]], 4);
    }

    #[test]
    fn converts_second_order_fuma_frame() {
        let input: Vec<f32> = (0..9).map(|i| i as f32).collect();
        let mut output = [0.0; 9];
        convert_frame(&input, &mut output, AmbiNormalization::N3D, AmbiOrdering::FuMa);
        assert_eq!(output, [0.0, 2.0, 3.0, 1.0, 8.0, 6.0, 4.0, 5.0, 7.0]);
    }

    #[test]
    fn n3d_acn_is_passthrough() {
        let input: Vec<f32> = (0..16).map(|i| i as f32 * 0.1).collect();
        let mut output = [0.0; 16];
        convert_frame(&input, &mut output, AmbiNormalization::N3D, AmbiOrdering::ACN);
        for (a, b) in input.iter().zip(output.iter()) {
            assert_relative_eq!(a, b);
        }
    }

    #[test]
    #[should_panic]
    fn out_of_range_index_panics() {
        AmbiOrdering::ACN.source_index(MAX_AMBI_COEFFS);
    }
}
