// tests/tensors_dense.rs

use num_complex::Complex;

use crate::error::Error;
use crate::math::tensor::{fill_random, RandType, Tensor, TensorMap, TensorMapMut};
use crate::math::{ComplexD, ComplexF, Layout, Matrix};

//===================================================================
// --------------------------- Dense tensor -------------------------
//===================================================================

#[test]
fn basic_dense_tensor_demo() {
    // Construct a 2×3 f64 tensor filled with zeros.
    let mut a: Tensor<f64> = Tensor::new(vec![2, 3]);
    assert_eq!(a.len(), 6);
    assert_eq!(a.strides(), &[3, 1]);

    for (k, idx) in [[0, 0], [0, 1], [0, 2], [1, 0], [1, 1], [1, 2]].iter().enumerate() {
        a.set(idx, (k + 1) as f64);
    }
    assert_eq!(a.get(&[1, 2]), 6.0);

    // Parallel in-place map: x ↦ 2x
    a.par_map_in_place(|x| 2.0 * x);
    assert_eq!(a.get(&[0, 2]), 6.0);

    // Elementwise arithmetic
    let b = a.clone();
    let c = a + b;
    assert_eq!(c.shape(), &[2, 3]);
    assert_eq!(c.get(&[1, 1]), 20.0);

    // Linear index
    let idx = c.index(&[1, 2]);
    assert_eq!(c.data()[idx], 24.0);
}

#[test]
fn from_vec_rejects_wrong_length() {
    let err = Tensor::<f64>::from_vec(vec![2, 2], vec![1.0; 3]).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { op: "Tensor::from_vec", .. }));
}

#[test]
fn from_fn_is_row_major() {
    let t = Tensor::<f64>::from_fn(vec![2, 3, 4], |idx| (idx[0] * 100 + idx[1] * 10 + idx[2]) as f64);
    assert_eq!(t.data()[0], 0.0);
    assert_eq!(t.data()[1], 1.0);
    assert_eq!(t.data()[4], 10.0);
    assert_eq!(t.data()[12], 100.0);
    assert_eq!(t.get(&[1, 2, 3]), 123.0);
}

#[test]
fn cast_to_single_precision() {
    let t = Tensor::<ComplexD>::from_fn(vec![3], |idx| Complex::new(idx[0] as f64 + 0.5, -1.0));
    let s: Tensor<ComplexF> = t.cast_to();
    assert_eq!(s.get(&[2]), Complex::new(2.5f32, -1.0));
}

#[test]
fn zip_with_checks_shape() {
    let mut a = Tensor::<f64>::new(vec![2, 2]);
    let b = Tensor::<f64>::new(vec![4]);
    assert!(a.par_zip_with_inplace(&b, |x, y| x + y).is_err());
}

#[test]
fn random_fill_respects_bounds() {
    // Arrange
    let mut t = Tensor::<ComplexD>::new(vec![16, 16]);

    // Act
    fill_random(&mut t, RandType::Uniform { low: -1.0, high: 1.0 }).unwrap();

    // Assert
    assert!(t.data().iter().all(|z| (-1.0..1.0).contains(&z.re) && (-1.0..1.0).contains(&z.im)));
    assert!(t.data().iter().any(|z| z.re != 0.0));
}

#[test]
fn random_fill_rejects_bad_parameters() {
    let mut t = Tensor::<f64>::new(vec![4]);
    let err = fill_random(&mut t, RandType::Normal { mean: 0.0, std: -1.0 }).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

//===================================================================
// ---------------------------- Views -------------------------------
//===================================================================

#[test]
fn map_views_cover_a_prefix() {
    let mut buf = vec![0.0f64; 32];
    {
        let mut m = TensorMapMut::new(buf.as_mut_slice(), [2, 3, 4]).unwrap();
        assert_eq!(m.as_slice().len(), 24);
        m.set([1, 2, 3], 7.0);
        assert_eq!(m.view().get([1, 2, 3]), 7.0);
    }
    assert_eq!(buf[23], 7.0);

    let view = TensorMap::new(buf.as_slice(), [4, 4]).unwrap();
    assert_eq!(view.index([1, 0]), 4);
    assert!(TensorMap::new(buf.as_slice(), [4, 9]).is_err());
}

//===================================================================
// ---------------------------- Matrix ------------------------------
//===================================================================

#[test]
fn matrix_layouts_agree_on_values() {
    let a = Matrix::<f64>::from_fn(2, 3, Layout::RowMajor, |r, c| (r * 3 + c) as f64);
    let b = a.to_layout(Layout::ColMajor);
    assert_eq!(a.offset(1, 0), 3);
    assert_eq!(b.offset(1, 0), 1);
    for r in 0..2 {
        for c in 0..3 {
            assert_eq!(a.get(r, c), b.get(r, c));
        }
    }
}

#[test]
fn matrix_block_and_trace() {
    let mut m = Matrix::<ComplexD>::new(4, 4);
    let block = Matrix::identity(2, Layout::RowMajor);
    m.set_block(2, 2, &block).unwrap();
    assert_eq!(m.trace(), Complex::new(2.0, 0.0));
    assert!(m.set_block(3, 3, &block).is_err());

    m.resize(4, 4);
    assert_eq!(m.trace(), Complex::new(2.0, 0.0));
    m.resize(2, 2);
    assert_eq!(m.trace(), Complex::new(0.0, 0.0));
}
