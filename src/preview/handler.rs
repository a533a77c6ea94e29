//! Registry of the in-memory representations that can be saved.

use itertools::Itertools;
use serde::Deserialize;
use strum_macros::{Display, EnumString};

use super::program::{self, ProgramError, SaveProgram, PATH, VALUE};
use crate::ply::Layout;

/// How numeric arrays and tensors are turned into files.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArrayWriter {
    /// Write the PLY text directly, needs only numpy in the debuggee.
    #[default]
    Direct,
    /// Build an open3d point cloud and let open3d write it.
    Open3d,
}

/// One supported representation.
///
/// `test` produces a boolean Python expression over [`VALUE`]; `save` produces the module
/// the save body depends on and the body itself (statements over [`VALUE`] and [`PATH`]).
pub struct TypeHandler {
    pub name: &'static str,
    test: fn() -> String,
    save: fn(ArrayWriter) -> (&'static str, String),
}

impl TypeHandler {
    pub const fn new(
        name: &'static str,
        test: fn() -> String,
        save: fn(ArrayWriter) -> (&'static str, String),
    ) -> Self {
        Self { name, test, save }
    }

    /// Remote expression that is `True` when `expression` has this representation.
    pub fn predicate(&self, expression: &str) -> Result<String, ProgramError> {
        program::predicate(expression, &(self.test)())
    }

    /// Remote program that writes `expression` into `destination`.
    pub fn save_program(
        &self,
        expression: &str,
        destination: &str,
        writer: ArrayWriter,
    ) -> Result<SaveProgram, ProgramError> {
        let (module, body) = (self.save)(writer);
        program::save_program(expression, destination, module, &body)
    }
}

impl std::fmt::Debug for TypeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeHandler").field("name", &self.name).finish()
    }
}

/// Supported representations in priority order.
pub static REGISTRY: &[TypeHandler] = &[
    TypeHandler::new("open3d point cloud", open3d_test, open3d_save),
    TypeHandler::new("numpy array", ndarray_test, ndarray_save),
    TypeHandler::new("torch tensor", tensor_test, tensor_save),
];

/// Install hint shown when `module` is missing in the debuggee.
pub fn install_guidance(module: &str) -> String {
    match module {
        "open3d" => "pip install open3d (https://www.open3d.org/docs/release/getting_started.html)"
            .to_string(),
        "numpy" => "pip install numpy (https://numpy.org/install/)".to_string(),
        "torch" => "see https://pytorch.org/get-started/locally/".to_string(),
        other => format!("pip install {other}"),
    }
}

fn class_name() -> String {
    format!("type({VALUE}).__name__")
}

fn class_module() -> String {
    format!("(getattr(type({VALUE}), '__module__', '') or '')")
}

/// `len(shape) == 2 and shape[1] in (3, 6)`
fn point_matrix() -> String {
    let columns = Layout::ALL.iter().map(|l| l.columns()).join(", ");
    format!(
        "len(getattr({VALUE}, 'shape', ())) == 2 and {VALUE}.shape[1] in ({columns})"
    )
}

fn open3d_test() -> String {
    format!(
        "'PointCloud' in {} and 'open3d' in {}",
        class_name(),
        class_module()
    )
}

fn ndarray_test() -> String {
    format!(
        "{} == 'ndarray' and {}.split('.')[0] == 'numpy' and {}",
        class_name(),
        class_module(),
        point_matrix()
    )
}

fn tensor_test() -> String {
    format!(
        "'Tensor' in {} and 'torch' in {} and {}",
        class_name(),
        class_module(),
        point_matrix()
    )
}

fn open3d_save(_: ArrayWriter) -> (&'static str, String) {
    let body = format!(
        "import open3d\n\
         if not open3d.io.write_point_cloud({PATH}, {VALUE}, write_ascii=True):\n    \
             raise IOError('open3d could not write ' + {PATH})\n"
    );
    ("open3d", body)
}

fn ndarray_save(writer: ArrayWriter) -> (&'static str, String) {
    array_save(&format!("numpy.asarray({VALUE})"), writer)
}

fn tensor_save(writer: ArrayWriter) -> (&'static str, String) {
    array_save(&format!("{VALUE}.detach().cpu().numpy()"), writer)
}

/// Save body for a 2D array, `to_array` converts [`VALUE`] into a numpy array.
fn array_save(to_array: &str, writer: ArrayWriter) -> (&'static str, String) {
    let columns = Layout::ALL.iter().map(|l| l.columns()).join(", ");
    let mut body = format!(
        "import numpy\n\
         a = {to_array}\n\
         if a.ndim != 2 or a.shape[1] not in ({columns}):\n    \
             raise ValueError('expected an (N, 3) or (N, 6) array, got shape %r' % (a.shape,))\n\
         xyz = a[:, :3].astype(numpy.float64)\n\
         unit = numpy.issubdtype(a.dtype, numpy.floating) and a.shape[1] == 6 and a.shape[0] > 0 \
         and a[:, 3:6].min() >= 0.0 and a[:, 3:6].max() <= 1.0\n"
    );

    match writer {
        ArrayWriter::Direct => {
            body.push_str(&format!(
                "if a.shape[1] == 6:\n    \
                     rgb = a[:, 3:6].astype(numpy.float64)\n    \
                     if unit:\n        \
                         rgb = numpy.round(rgb * 255.0)\n    \
                     rgb = numpy.trunc(numpy.clip(rgb, 0.0, 255.0))\n    \
                     data = numpy.hstack((xyz, rgb))\n    \
                     header, fmt = {}, {}\n\
                 else:\n    \
                     data = xyz\n    \
                     header, fmt = {}, {}\n\
                 with open({PATH}, 'w', newline='\\n') as f:\n    \
                     f.write(header % data.shape[0])\n    \
                     numpy.savetxt(f, data, fmt=fmt)\n",
                program::py_str(&Layout::XyzRgb.header_template()),
                program::py_str(Layout::XyzRgb.row_format()),
                program::py_str(&Layout::Xyz.header_template()),
                program::py_str(Layout::Xyz.row_format()),
            ));
            ("numpy", body)
        }
        ArrayWriter::Open3d => {
            body.push_str(&format!(
                "import open3d\n\
                 pcd = open3d.geometry.PointCloud()\n\
                 pcd.points = open3d.utility.Vector3dVector(xyz)\n\
                 if a.shape[1] == 6:\n    \
                     rgb = a[:, 3:6].astype(numpy.float64)\n    \
                     if not unit:\n        \
                         rgb = numpy.trunc(numpy.clip(rgb, 0.0, 255.0)) / 255.0\n    \
                     pcd.colors = open3d.utility.Vector3dVector(rgb)\n\
                 if not open3d.io.write_point_cloud({PATH}, pcd, write_ascii=True):\n    \
                     raise IOError('open3d could not write ' + {PATH})\n"
            ));
            ("open3d", body)
        }
    }
}
