//! PLY (polygon file format) ASCII layout of the produced artifacts.
//!
//! The files are written inside the debuggee, this module only owns the header layout so
//! the generated programs and the tests agree on it.

/// Per-vertex properties of a point cloud file.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Layout {
    /// `x y z` as floats.
    Xyz,
    /// `x y z` as floats followed by `red green blue` as unsigned bytes.
    XyzRgb,
}

impl Layout {
    pub const ALL: [Layout; 2] = [Layout::Xyz, Layout::XyzRgb];

    /// Number of values per vertex line.
    pub fn columns(self) -> usize {
        self.properties().len()
    }

    pub fn properties(self) -> &'static [(&'static str, &'static str)] {
        const XYZ_RGB: &[(&str, &str)] = &[
            ("float", "x"),
            ("float", "y"),
            ("float", "z"),
            ("uchar", "red"),
            ("uchar", "green"),
            ("uchar", "blue"),
        ];
        match self {
            Layout::Xyz => &XYZ_RGB[..3],
            Layout::XyzRgb => XYZ_RGB,
        }
    }

    /// Header with the vertex count left as a printf style `%d` placeholder.
    pub fn header_template(self) -> String {
        self.header_with_count("%d")
    }

    /// Row format for `numpy.savetxt`.
    pub fn row_format(self) -> &'static str {
        match self {
            Layout::Xyz => "%.9g %.9g %.9g",
            Layout::XyzRgb => "%.9g %.9g %.9g %d %d %d",
        }
    }

    fn header_with_count(self, count: &str) -> String {
        let mut header = format!("ply\nformat ascii 1.0\nelement vertex {count}\n");
        for (ty, name) in self.properties() {
            header.push_str(&format!("property {ty} {name}\n"));
        }
        header.push_str("end_header\n");
        header
    }
}
