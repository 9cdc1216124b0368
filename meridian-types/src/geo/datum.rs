/// Reference ellipsoid of a coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datum {
    semimajor: f64,
    inv_flattening: f64,
}

impl Datum {
    /// WGS84 ellipsoid.
    pub const WGS84: Self = Datum {
        semimajor: 6_378_137.0,
        inv_flattening: 298.257223563,
    };

    /// GRS80 ellipsoid.
    pub const GRS80: Self = Datum {
        semimajor: 6_378_137.0,
        inv_flattening: 298.257222101,
    };

    /// Sphere with the WGS84 semimajor axis, as used by Web Mercator.
    pub const WEB_SPHERE: Self = Datum::sphere(6_378_137.0);

    /// Sphere of the given radius. Spheres have `inv_flattening == 0`.
    pub const fn sphere(radius: f64) -> Self {
        Self {
            semimajor: radius,
            inv_flattening: 0.0,
        }
    }

    /// Ellipsoid given by the semimajor axis and the inverse flattening.
    pub const fn new(semimajor: f64, inv_flattening: f64) -> Self {
        Self {
            semimajor,
            inv_flattening,
        }
    }

    /// Ellipsoid given by its two semi-axes.
    pub fn from_axes(semimajor: f64, semiminor: f64) -> Self {
        if semimajor == semiminor {
            Self::sphere(semimajor)
        } else {
            Self::new(semimajor, semimajor / (semimajor - semiminor))
        }
    }

    /// Ellipsoid by its proj name (`+ellps=...`).
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "WGS84" => Some(Self::WGS84),
            "GRS80" => Some(Self::GRS80),
            "sphere" => Some(Self::sphere(6_370_997.0)),
            _ => None,
        }
    }

    /// Semimajor axis in meters.
    pub fn semimajor(&self) -> f64 {
        self.semimajor
    }

    /// Inverse flattening, `0` for spheres.
    pub fn inv_flattening(&self) -> f64 {
        self.inv_flattening
    }

    /// Returns true if the datum is a sphere.
    pub fn is_sphere(&self) -> bool {
        self.inv_flattening == 0.0
    }

    /// First eccentricity.
    pub fn eccentricity(&self) -> f64 {
        if self.is_sphere() {
            return 0.0;
        }

        let f = 1.0 / self.inv_flattening;
        (f * (2.0 - f)).sqrt()
    }
}

impl Default for Datum {
    fn default() -> Self {
        Self::WGS84
    }
}
