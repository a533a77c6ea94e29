pub const WELCOME_TEXT: &str = r#"
plysnap is attached, type an expression to save it as a PLY file (`help` for more)
"#;

pub const HELP: &str = r#"
Available commands:

<expression>                                -- save a point cloud expression of the paused debuggee
@<file>:<line>:<column>                     -- save the expression found at a source position
h, help                                     -- show help
q, quit                                     -- detach and exit

Supported values: open3d PointCloud, numpy arrays and torch tensors of shape (N, 3) or (N, 6).
With six columns the last three are colors, either in [0, 1] or in [0, 255].
"#;
