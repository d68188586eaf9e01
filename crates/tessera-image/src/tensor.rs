use std::fmt;
use std::str::FromStr;

use crate::error::ImageError;

/// How the tensor elements of a pixel are laid out in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TensorShape {
    /// A column vector of `n` elements; a scalar is a 1-element column vector.
    #[default]
    ColVector,
    /// A row vector of `n` elements.
    RowVector,
    /// A matrix stored column by column.
    ColMajorMatrix,
    /// A matrix stored row by row.
    RowMajorMatrix,
    /// A square matrix of which only the diagonal is stored.
    DiagonalMatrix,
    /// A symmetric square matrix; the diagonal and the upper triangle are stored.
    SymmetricMatrix,
    /// An upper-triangular square matrix.
    UpperTriangular,
    /// A lower-triangular square matrix.
    LowerTriangular,
}

impl FromStr for TensorShape {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "column vector" => Ok(TensorShape::ColVector),
            "row vector" => Ok(TensorShape::RowVector),
            "column-major matrix" => Ok(TensorShape::ColMajorMatrix),
            "row-major matrix" => Ok(TensorShape::RowMajorMatrix),
            "diagonal matrix" => Ok(TensorShape::DiagonalMatrix),
            "symmetric matrix" => Ok(TensorShape::SymmetricMatrix),
            "upper triangular matrix" => Ok(TensorShape::UpperTriangular),
            "lower triangular matrix" => Ok(TensorShape::LowerTriangular),
            _ => Err(ImageError::InvalidFlag(s.to_string())),
        }
    }
}

/// The shape of the value stored at each pixel.
///
/// # Examples
///
/// ```
/// use tessera_image::{Tensor, TensorShape};
///
/// let t = Tensor::with_shape(TensorShape::SymmetricMatrix, 3, 3).unwrap();
/// assert_eq!(t.elements(), 6);
/// assert_eq!(t.look_up_table(), vec![0, 3, 4, 3, 1, 5, 4, 5, 2]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tensor {
    shape: TensorShape,
    elements: usize,
    rows: usize,
}

impl Default for Tensor {
    fn default() -> Self {
        Tensor::scalar()
    }
}

/// Number of stored elements of an `n`x`n` symmetric or triangular matrix.
pub fn n_upper_diagonal_elements(n: usize) -> usize {
    n * (n + 1) / 2
}

impl Tensor {
    /// A scalar tensor: one element.
    pub fn scalar() -> Self {
        Tensor {
            shape: TensorShape::ColVector,
            elements: 1,
            rows: 1,
        }
    }

    /// A column vector with `n` elements.
    pub fn vector(n: usize) -> Result<Self, ImageError> {
        if n == 0 {
            return Err(ImageError::ParameterOutOfRange(
                "a tensor needs at least one element".to_string(),
            ));
        }
        Ok(Tensor {
            shape: TensorShape::ColVector,
            elements: n,
            rows: n,
        })
    }

    /// A column-major matrix with `rows` x `cols` elements.
    pub fn matrix(rows: usize, cols: usize) -> Result<Self, ImageError> {
        Self::with_shape(TensorShape::ColMajorMatrix, rows, cols)
    }

    /// A tensor of arbitrary shape.
    ///
    /// # Errors
    ///
    /// Fails with `ParameterOutOfRange` if `rows` or `cols` is zero, and with `InvalidParameter`
    /// if the shape constraints are violated (a vector with more than one column or row, a
    /// non-square diagonal, symmetric or triangular matrix).
    pub fn with_shape(shape: TensorShape, rows: usize, cols: usize) -> Result<Self, ImageError> {
        if rows == 0 || cols == 0 {
            return Err(ImageError::ParameterOutOfRange(
                "tensor rows and columns must be non-zero".to_string(),
            ));
        }
        let tensor = match shape {
            TensorShape::ColVector => {
                if cols != 1 {
                    return Err(ImageError::InvalidParameter(
                        "a column vector has one column".to_string(),
                    ));
                }
                Tensor {
                    shape,
                    elements: rows,
                    rows,
                }
            }
            TensorShape::RowVector => {
                if rows != 1 {
                    return Err(ImageError::InvalidParameter(
                        "a row vector has one row".to_string(),
                    ));
                }
                Tensor {
                    shape,
                    elements: cols,
                    rows: 1,
                }
            }
            TensorShape::ColMajorMatrix | TensorShape::RowMajorMatrix => {
                let mut t = Tensor {
                    shape,
                    elements: rows * cols,
                    rows,
                };
                t.correct_shape();
                t
            }
            TensorShape::DiagonalMatrix
            | TensorShape::SymmetricMatrix
            | TensorShape::UpperTriangular
            | TensorShape::LowerTriangular => {
                if rows != cols {
                    return Err(ImageError::InvalidParameter(
                        "the tensor matrix must be square".to_string(),
                    ));
                }
                let elements = if shape == TensorShape::DiagonalMatrix {
                    rows
                } else {
                    n_upper_diagonal_elements(rows)
                };
                let mut t = Tensor {
                    shape,
                    elements,
                    rows,
                };
                if rows == 1 {
                    t.shape = TensorShape::ColVector;
                }
                t
            }
        };
        Ok(tensor)
    }

    fn correct_shape(&mut self) {
        if matches!(
            self.shape,
            TensorShape::ColMajorMatrix | TensorShape::RowMajorMatrix
        ) {
            if self.rows == self.elements {
                self.shape = TensorShape::ColVector;
            } else if self.rows == 1 {
                self.shape = TensorShape::RowVector;
            }
        }
    }

    /// The shape tag.
    pub fn shape(&self) -> TensorShape {
        self.shape
    }

    /// Number of stored elements.
    pub fn elements(&self) -> usize {
        self.elements
    }

    /// Number of rows of the (logical) matrix.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns of the (logical) matrix.
    pub fn columns(&self) -> usize {
        match self.shape {
            TensorShape::ColVector => 1,
            TensorShape::RowVector => self.elements,
            TensorShape::ColMajorMatrix | TensorShape::RowMajorMatrix => {
                self.elements / self.rows
            }
            _ => self.rows,
        }
    }

    /// The sizes of the logical matrix, `[rows, columns]`.
    pub fn sizes(&self) -> [usize; 2] {
        [self.rows, self.columns()]
    }

    /// True if there is a single element.
    pub fn is_scalar(&self) -> bool {
        self.elements == 1
    }

    /// True for row and column vectors with more than one element.
    pub fn is_vector(&self) -> bool {
        matches!(self.shape, TensorShape::ColVector | TensorShape::RowVector) && self.elements > 1
    }

    /// True if the logical matrix is square.
    pub fn is_square(&self) -> bool {
        self.rows == self.columns()
    }

    /// True if the storage order is plain column-major (vectors included).
    pub fn has_normal_order(&self) -> bool {
        matches!(
            self.shape,
            TensorShape::ColVector | TensorShape::RowVector | TensorShape::ColMajorMatrix
        )
    }

    /// Changes to a column vector with the same number of elements.
    pub fn change_shape_to_vector(&mut self) {
        self.shape = TensorShape::ColVector;
        self.rows = self.elements;
    }

    /// Changes to a column-major matrix with `rows` rows, keeping the number of elements.
    pub fn change_shape(&mut self, rows: usize) -> Result<(), ImageError> {
        if rows == 0 || self.elements % rows != 0 {
            return Err(ImageError::InvalidParameter(format!(
                "cannot reshape a tensor of {} elements to {} rows",
                self.elements, rows
            )));
        }
        if self.rows != rows || !self.has_normal_order() {
            self.rows = rows;
            self.shape = TensorShape::ColMajorMatrix;
            self.correct_shape();
        }
        Ok(())
    }

    /// Takes the shape of `example`, which must have the same number of elements.
    pub fn change_shape_like(&mut self, example: &Tensor) -> Result<(), ImageError> {
        if self.elements != example.elements {
            return Err(ImageError::NTensorElementsDontMatch(
                self.elements,
                example.elements,
            ));
        }
        self.shape = example.shape;
        self.rows = example.rows;
        Ok(())
    }

    /// Reinterprets a vector as a diagonal matrix.
    pub fn change_shape_to_diagonal(&mut self) -> Result<(), ImageError> {
        if !matches!(self.shape, TensorShape::ColVector | TensorShape::RowVector) {
            return Err(ImageError::InvalidParameter(
                "only a vector can be reshaped to a diagonal matrix".to_string(),
            ));
        }
        if self.elements > 1 {
            self.shape = TensorShape::DiagonalMatrix;
            self.rows = self.elements;
        }
        Ok(())
    }

    /// Transposes the logical matrix without moving any element.
    pub fn transpose(&mut self) {
        match self.shape {
            TensorShape::ColVector => {
                self.shape = TensorShape::RowVector;
                self.rows = 1;
            }
            TensorShape::RowVector => {
                self.shape = TensorShape::ColVector;
                self.rows = self.elements;
            }
            TensorShape::ColMajorMatrix => {
                self.shape = TensorShape::RowMajorMatrix;
                self.rows = self.elements / self.rows;
            }
            TensorShape::RowMajorMatrix => {
                self.shape = TensorShape::ColMajorMatrix;
                self.rows = self.elements / self.rows;
            }
            TensorShape::DiagonalMatrix | TensorShape::SymmetricMatrix => {}
            TensorShape::UpperTriangular => self.shape = TensorShape::LowerTriangular,
            TensorShape::LowerTriangular => self.shape = TensorShape::UpperTriangular,
        }
    }

    /// The storage index of logical element `(row, col)`.
    ///
    /// # Errors
    ///
    /// Fails with `IndexOutOfRange` if the element lies outside the matrix or is an implicit
    /// zero of a diagonal or triangular matrix.
    pub fn index(&self, row: usize, col: usize) -> Result<usize, ImageError> {
        if row >= self.rows || col >= self.columns() {
            return Err(ImageError::IndexOutOfRange);
        }
        let m = self.rows;
        let lut = self.look_up_table();
        match lut[col * m + row] {
            idx if idx >= 0 => Ok(idx as usize),
            _ => Err(ImageError::IndexOutOfRange),
        }
    }

    /// Maps each logical element `(m, n)`, at position `n * rows + m`, to its storage index.
    ///
    /// Implicit zeros (off-diagonal elements of diagonal matrices, the empty triangle of
    /// triangular matrices) are marked with `-1`. Symmetric and triangular matrices store the
    /// diagonal first, followed by the off-diagonal elements column by column.
    pub fn look_up_table(&self) -> Vec<isize> {
        let rows = self.rows;
        let cols = self.columns();
        let mut lut = vec![-1isize; rows * cols];
        let mut index = 0isize;
        match self.shape {
            TensorShape::ColVector | TensorShape::RowVector | TensorShape::ColMajorMatrix => {
                for entry in lut.iter_mut() {
                    *entry = index;
                    index += 1;
                }
            }
            TensorShape::RowMajorMatrix => {
                for m in 0..rows {
                    for n in 0..cols {
                        lut[n * rows + m] = index;
                        index += 1;
                    }
                }
            }
            TensorShape::DiagonalMatrix => {
                for m in 0..rows {
                    lut[m * rows + m] = index;
                    index += 1;
                }
            }
            TensorShape::SymmetricMatrix
            | TensorShape::UpperTriangular
            | TensorShape::LowerTriangular => {
                for m in 0..rows {
                    lut[m * rows + m] = index;
                    index += 1;
                }
                for n in 1..cols {
                    for m in 0..n {
                        match self.shape {
                            TensorShape::SymmetricMatrix => {
                                lut[n * rows + m] = index;
                                lut[m * rows + n] = index;
                            }
                            TensorShape::UpperTriangular => lut[n * rows + m] = index,
                            _ => lut[m * rows + n] = index,
                        }
                        index += 1;
                    }
                }
            }
        }
        lut
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_scalar() {
            return f.write_str("scalar");
        }
        write!(f, "{}x{} {:?}", self.rows, self.columns(), self.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_and_matrix() -> Result<(), ImageError> {
        let v = Tensor::vector(3)?;
        assert!(v.is_vector());
        assert_eq!(v.sizes(), [3, 1]);
        let m = Tensor::matrix(2, 3)?;
        assert_eq!(m.elements(), 6);
        assert_eq!(m.columns(), 3);
        assert_eq!(Tensor::matrix(1, 4)?.shape(), TensorShape::RowVector);
        assert_eq!(Tensor::matrix(4, 1)?.shape(), TensorShape::ColVector);
        assert!(Tensor::vector(0).is_err());
        Ok(())
    }

    #[test]
    fn test_transpose() -> Result<(), ImageError> {
        let mut m = Tensor::matrix(2, 3)?;
        m.transpose();
        assert_eq!(m.shape(), TensorShape::RowMajorMatrix);
        assert_eq!(m.sizes(), [3, 2]);
        #[rustfmt::skip]
        assert_eq!(m.look_up_table(), vec![
            0, 2, 4,
            1, 3, 5,
        ]);
        Ok(())
    }

    #[test]
    fn test_triangular_and_diagonal_tables() -> Result<(), ImageError> {
        let d = Tensor::with_shape(TensorShape::DiagonalMatrix, 3, 3)?;
        assert_eq!(d.look_up_table(), vec![0, -1, -1, -1, 1, -1, -1, -1, 2]);
        assert_eq!(d.index(1, 1)?, 1);
        assert_eq!(d.index(0, 1), Err(ImageError::IndexOutOfRange));

        let u = Tensor::with_shape(TensorShape::UpperTriangular, 3, 3)?;
        // column-major: (0,0) (1,0) (2,0) (0,1) ...
        assert_eq!(u.look_up_table(), vec![0, -1, -1, 3, 1, -1, 4, 5, 2]);
        assert_eq!(u.index(0, 2)?, 4);

        let l = Tensor::with_shape(TensorShape::LowerTriangular, 3, 3)?;
        assert_eq!(l.look_up_table(), vec![0, 3, 4, -1, 1, 5, -1, -1, 2]);
        Ok(())
    }

    #[test]
    fn test_symmetric_index() -> Result<(), ImageError> {
        let s = Tensor::with_shape(TensorShape::SymmetricMatrix, 4, 4)?;
        assert_eq!(s.elements(), 10);
        assert_eq!(s.index(0, 1)?, 4);
        assert_eq!(s.index(1, 0)?, 4);
        assert_eq!(s.index(1, 2)?, 6);
        assert_eq!(s.index(2, 3)?, 8);
        assert_eq!(s.index(3, 3)?, 3);
        assert!(!s.has_normal_order());
        Ok(())
    }

    #[test]
    fn test_reshape() -> Result<(), ImageError> {
        let mut t = Tensor::vector(6)?;
        t.change_shape(2)?;
        assert_eq!(t.sizes(), [2, 3]);
        assert!(t.change_shape(4).is_err());
        let mut d = Tensor::vector(3)?;
        d.change_shape_to_diagonal()?;
        assert_eq!(d.shape(), TensorShape::DiagonalMatrix);
        assert_eq!(d.sizes(), [3, 3]);
        Ok(())
    }
}
