/// What role a design file plays, judged by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    CadSource,
    CadExport,
    PcbSource,
    PcbExport,
    Image,
}

impl FileKind {
    /// Classify a file extension (with or without the leading dot, any case).
    ///
    /// CAD and PCB formats win over images for extensions that are both, such as `svg` or `dxf`.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.strip_prefix('.').unwrap_or(extension).to_lowercase();
        cad_kind(&extension)
            .or_else(|| pcb_kind(&extension))
            .or_else(|| is_image(&extension).then_some(Self::Image))
    }

    #[must_use]
    pub const fn is_source(self) -> bool {
        matches!(self, Self::CadSource | Self::PcbSource)
    }

    #[must_use]
    pub const fn is_export(self) -> bool {
        matches!(self, Self::CadExport | Self::PcbExport)
    }
}

fn cad_kind(extension: &str) -> Option<FileKind> {
    match extension {
        "3dm" | "asm" | "catpart" | "catproduct" | "cgr" | "dgn" | "dwg" | "dxf" | "fcstd" | "iam" | "ipt" | "model" | "par"
        | "prt" | "psm" | "scad" | "sldasm" | "sldprt" => Some(FileKind::CadSource),

        "3dxml" | "3ko" | "3mf" | "amf" | "asab" | "asat" | "csg" | "dae" | "html" | "iges" | "igs" | "iwb" | "iwp" | "jt"
        | "j_t" | "obj" | "off" | "pdf" | "ply" | "pod" | "prc" | "sab" | "sat" | "sms" | "step" | "stl" | "stp" | "svg"
        | "u3d" | "vda" | "wrl" | "x_t" | "xcgm" => Some(FileKind::CadExport),

        _ => None,
    }
}

fn pcb_kind(extension: &str) -> Option<FileKind> {
    match extension {
        "brd" | "pro" | "sch" | "kicad_pcb" | "kicad_sch" | "kicad_pro" => Some(FileKind::PcbSource),
        "gbr" | "gerber" | "drl" => Some(FileKind::PcbExport),
        _ => None,
    }
}

fn is_image(extension: &str) -> bool {
    matches!(
        extension,
        "jpg"
            | "jpeg"
            | "png"
            | "3ds"
            | "max"
            | "bmp"
            | "dds"
            | "gif"
            | "psd"
            | "xcf"
            | "tga"
            | "thm"
            | "tif"
            | "tiff"
            | "yuv"
            | "ai"
            | "eps"
            | "ps"
            | "gpx"
            | "kml"
            | "kmz"
            | "webp"
    )
}
