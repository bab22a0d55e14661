//! OME-XML metadata handling
//!
//! Microscopy TIFFs carry their series-level structure (channel count,
//! pixel type, physical pixel size) as an OME-XML block in the
//! ImageDescription tag. The files this pipeline targets frequently have a
//! corrupted or truncated block, so parsing is strict and every failure is
//! surfaced to the caller, which then falls back to the baseline TIFF tags.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::raster::types::{PhysicalScale, PixelType};
use crate::tiff::errors::{TiffError, TiffResult};

/// Structural fields recovered from an OME-XML description
#[derive(Debug, Clone, Default)]
pub struct OmeInfo {
    /// SizeC attribute (channel count)
    pub size_c: Option<usize>,
    /// SizeX attribute (width)
    pub size_x: Option<u64>,
    /// SizeY attribute (height)
    pub size_y: Option<u64>,
    /// Pixel type from the Type attribute
    pub pixel_type: Option<PixelType>,
    /// Physical pixel size, when both X and Y sizes are present
    pub scale: Option<PhysicalScale>,
}

/// Parse the Pixels element out of an OME-XML description
///
/// # Arguments
/// * `description` - Raw ImageDescription text; leading junk before the
///   XML declaration or the OME element is tolerated
///
/// # Returns
/// The recovered structural fields, or an error when the block is missing
/// or malformed (the caller treats that as corrupted metadata)
pub fn parse_ome(description: &str) -> TiffResult<OmeInfo> {
    let xml = trim_to_xml(description)
        .ok_or_else(|| TiffError::GenericError("No OME-XML block in description".to_string()))?;

    let mut reader = Reader::from_str(xml);
    let mut info = OmeInfo::default();
    let mut found_pixels = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() != b"Pixels" {
                    continue;
                }
                found_pixels = true;

                let mut phys_x: Option<f64> = None;
                let mut phys_y: Option<f64> = None;
                let mut unit = "um".to_string();

                for attr in e.attributes() {
                    let attr = attr.map_err(|e| {
                        TiffError::GenericError(format!("Bad Pixels attribute: {}", e))
                    })?;
                    let value = attr.unescape_value().map_err(|e| {
                        TiffError::GenericError(format!("Bad Pixels attribute value: {}", e))
                    })?;

                    match attr.key.local_name().as_ref() {
                        b"SizeC" => info.size_c = value.parse().ok(),
                        b"SizeX" => info.size_x = value.parse().ok(),
                        b"SizeY" => info.size_y = value.parse().ok(),
                        b"Type" => info.pixel_type = pixel_type_from_ome(&value),
                        b"PhysicalSizeX" => phys_x = value.parse().ok(),
                        b"PhysicalSizeY" => phys_y = value.parse().ok(),
                        b"PhysicalSizeXUnit" => unit = normalize_unit(&value),
                        _ => {}
                    }
                }

                if let (Some(x), Some(y)) = (phys_x, phys_y) {
                    if x > 0.0 && y > 0.0 {
                        info.scale = Some(PhysicalScale {
                            pixel_size_x: x,
                            pixel_size_y: y,
                            unit,
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TiffError::GenericError(format!("Malformed OME-XML: {}", e)));
            }
            _ => {}
        }
    }

    if !found_pixels {
        return Err(TiffError::GenericError("OME-XML has no Pixels element".to_string()));
    }
    Ok(info)
}

/// Build a minimal single-channel OME-XML description for a derived raster
///
/// Mirrors what downstream analysis tools need: dimensions, pixel type and
/// (when the source had one) the physical pixel size. Uses "um" rather than
/// the micro sign for ASCII compatibility.
pub fn single_channel_description(
    width: u64,
    height: u64,
    pixel_type: PixelType,
    channel_name: &str,
    scale: Option<&PhysicalScale>,
) -> String {
    let physical = match scale {
        Some(s) => format!(
            "\n            PhysicalSizeX=\"{}\" PhysicalSizeXUnit=\"{}\"\
             \n            PhysicalSizeY=\"{}\" PhysicalSizeYUnit=\"{}\"",
            s.pixel_size_x, s.unit, s.pixel_size_y, s.unit
        ),
        None => String::new(),
    };

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <OME xmlns=\"http://www.openmicroscopy.org/Schemas/OME/2016-06\">\n\
         \x20 <Image ID=\"Image:0\" Name=\"{name}\">\n\
         \x20   <Pixels DimensionOrder=\"XYCZT\" ID=\"Pixels:0\"{physical}\n\
         \x20           SizeC=\"1\" SizeT=\"1\" SizeZ=\"1\" SizeX=\"{width}\" SizeY=\"{height}\"\n\
         \x20           Type=\"{pixel_type}\">\n\
         \x20     <Channel ID=\"Channel:0:0\" Name=\"{name}\" SamplesPerPixel=\"1\"/>\n\
         \x20   </Pixels>\n\
         \x20 </Image>\n\
         </OME>",
        name = channel_name,
        physical = physical,
        width = width,
        height = height,
        pixel_type = pixel_type.name(),
    )
}

/// Strip any leading junk before the XML declaration or OME root element
fn trim_to_xml(description: &str) -> Option<&str> {
    if let Some(start) = description.find("<?xml") {
        return Some(&description[start..]);
    }
    description.find("<OME").map(|start| &description[start..])
}

fn pixel_type_from_ome(name: &str) -> Option<PixelType> {
    match name {
        "uint8" => Some(PixelType::U8),
        "uint16" => Some(PixelType::U16),
        "uint32" => Some(PixelType::U32),
        "float" => Some(PixelType::F32),
        "double" => Some(PixelType::F64),
        _ => None,
    }
}

fn normalize_unit(unit: &str) -> String {
    match unit {
        "\u{b5}m" | "\u{3bc}m" | "micron" => "um".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_block() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06">
  <Image ID="Image:0" Name="slide">
    <Pixels DimensionOrder="XYCZT" ID="Pixels:0"
            PhysicalSizeX="0.325" PhysicalSizeXUnit="µm"
            PhysicalSizeY="0.325" PhysicalSizeYUnit="µm"
            SizeC="3" SizeT="1" SizeZ="1" SizeX="4096" SizeY="2048"
            Type="uint16">
      <Channel ID="Channel:0:0" SamplesPerPixel="3"/>
    </Pixels>
  </Image>
</OME>"#;

        let info = parse_ome(xml).unwrap();
        assert_eq!(info.size_c, Some(3));
        assert_eq!(info.size_x, Some(4096));
        assert_eq!(info.size_y, Some(2048));
        assert_eq!(info.pixel_type, Some(PixelType::U16));

        let scale = info.scale.unwrap();
        assert!((scale.pixel_size_x - 0.325).abs() < 1e-9);
        assert_eq!(scale.unit, "um");
    }

    #[test]
    fn test_parse_with_leading_junk() {
        let xml = "\u{0}\u{0}garbage<OME><Image><Pixels SizeC=\"1\"/></Image></OME>";
        let info = parse_ome(xml).unwrap();
        assert_eq!(info.size_c, Some(1));
    }

    #[test]
    fn test_corrupted_block_is_an_error() {
        assert!(parse_ome("not xml at all").is_err());
        assert!(parse_ome("<OME><Pixels SizeC=\"3\"").is_err());
        assert!(parse_ome("<OME><Image/></OME>").is_err());
    }

    #[test]
    fn test_emitted_description_round_trips() {
        let scale = PhysicalScale {
            pixel_size_x: 0.5,
            pixel_size_y: 0.5,
            unit: "um".to_string(),
        };
        let desc = single_channel_description(1024, 768, PixelType::U16, "green", Some(&scale));
        let info = parse_ome(&desc).unwrap();

        assert_eq!(info.size_c, Some(1));
        assert_eq!(info.size_x, Some(1024));
        assert_eq!(info.size_y, Some(768));
        assert_eq!(info.pixel_type, Some(PixelType::U16));
        assert_eq!(info.scale.unwrap(), scale);
    }
}
