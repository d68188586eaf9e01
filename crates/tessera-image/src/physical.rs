use std::fmt;

/// Unit string used for dimensions without a physical size.
pub const PIXEL_UNITS: &str = "px";

/// A magnitude with a unit, e.g. `0.25 um`.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicalQuantity {
    /// The magnitude of the quantity.
    pub magnitude: f64,
    /// The units, as a free-form string.
    pub units: String,
}

impl PhysicalQuantity {
    /// Creates a new physical quantity.
    pub fn new(magnitude: f64, units: impl Into<String>) -> Self {
        Self {
            magnitude,
            units: units.into(),
        }
    }

    /// One pixel, the size of a dimension without physical units.
    pub fn pixel() -> Self {
        Self::new(1.0, PIXEL_UNITS)
    }

    /// True if the quantity is measured in pixels.
    pub fn is_pixel(&self) -> bool {
        self.units == PIXEL_UNITS
    }
}

impl Default for PhysicalQuantity {
    fn default() -> Self {
        Self::pixel()
    }
}

impl fmt::Display for PhysicalQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.units)
    }
}

/// The physical size of a pixel along each image dimension.
///
/// The last stored element applies to all dimensions beyond the stored ones, so a pixel size
/// with a single element describes an isotropic sampling. An empty pixel size means that
/// each dimension is one pixel in size.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PixelSize {
    size: Vec<PhysicalQuantity>,
}

impl PixelSize {
    /// An isotropic pixel size.
    pub fn isotropic(q: PhysicalQuantity) -> Self {
        Self { size: vec![q] }
    }

    /// A pixel size given per dimension.
    pub fn from_vec(size: Vec<PhysicalQuantity>) -> Self {
        let mut p = Self { size };
        p.trim();
        p
    }

    /// The pixel size along dimension `d`.
    pub fn get(&self, d: usize) -> PhysicalQuantity {
        match self.size.last() {
            None => PhysicalQuantity::pixel(),
            Some(last) => self.size.get(d).unwrap_or(last).clone(),
        }
    }

    /// Sets the pixel size along dimension `d`, keeping the other dimensions unchanged.
    pub fn set(&mut self, d: usize, q: PhysicalQuantity) {
        if self.get(d) == q {
            return;
        }
        self.ensure_len(d + 1);
        self.size[d] = q;
        self.trim();
    }

    /// True if any of the dimensions has a physical size.
    pub fn is_defined(&self) -> bool {
        self.size.iter().any(|q| !q.is_pixel())
    }

    /// True if all dimensions have the same size.
    pub fn is_isotropic(&self) -> bool {
        self.size.len() <= 1
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        self.size.len()
    }

    /// True if no element is stored.
    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }

    /// Removes all stored elements.
    pub fn clear(&mut self) {
        self.size.clear();
    }

    /// Reorders the dimensions, the new dimension `i` is the old dimension `order[i]`.
    pub fn permute(&mut self, order: &[usize]) {
        if self.is_isotropic() {
            return;
        }
        let size = order.iter().map(|&d| self.get(d)).collect();
        self.size = size;
        self.trim();
    }

    /// Swaps two dimensions.
    pub fn swap(&mut self, d1: usize, d2: usize) {
        if self.is_isotropic() {
            return;
        }
        self.ensure_len(d1.max(d2) + 1);
        self.size.swap(d1, d2);
        self.trim();
    }

    /// Inserts a dimension at `d` with the given size.
    pub fn insert(&mut self, d: usize, q: PhysicalQuantity) {
        if self.is_isotropic() && self.size.first().map_or(true, |s| *s == q) {
            return;
        }
        self.ensure_len(d + 1);
        self.size.insert(d, q);
        self.trim();
    }

    /// Removes dimension `d`.
    pub fn remove(&mut self, d: usize) {
        // the last stored element also stands for every dimension after it
        if d + 1 < self.size.len() {
            self.size.remove(d);
            self.trim();
        }
    }

    /// Scales the size along dimension `d` by `factor`.
    pub fn scale(&mut self, d: usize, factor: f64) {
        let mut q = self.get(d);
        q.magnitude *= factor;
        self.set(d, q);
    }

    /// Keeps the dimensions flagged in `keep`, in order.
    pub fn select(&mut self, keep: &[bool]) {
        if self.is_isotropic() {
            return;
        }
        let size = keep
            .iter()
            .enumerate()
            .filter(|(_, &k)| k)
            .map(|(d, _)| self.get(d))
            .collect();
        self.size = size;
        self.trim();
    }

    fn ensure_len(&mut self, n: usize) {
        if self.size.len() < n {
            let fill = self.get(self.size.len());
            self.size.resize(n, fill);
        }
    }

    // drops trailing elements equal to their predecessor
    fn trim(&mut self) {
        while let [.., a, b] = &self.size[..] {
            if a != b {
                break;
            }
            self.size.pop();
        }
    }
}
