use std::sync::atomic::Ordering;

use resxps::tiny_skia::IntSize;

use crate::{package_with_page, pixel, FONT_GUID};

const WHITE: (u8, u8, u8, u8) = (255, 255, 255, 255);
const RED: (u8, u8, u8, u8) = (255, 0, 0, 255);
const BLUE: (u8, u8, u8, u8) = (0, 0, 255, 255);
const BLACK: (u8, u8, u8, u8) = (0, 0, 0, 255);

fn render(markup: &str, width: u32, height: u32) -> resxps::tiny_skia::Pixmap {
    let (mut package, _) = package_with_page(markup);
    package
        .render_page(0, IntSize::from_wh(width, height).unwrap())
        .unwrap()
}

#[test]
fn pages_discovery() {
    let (package, _) = package_with_page(r#"<FixedPage Width="100" Height="100"/>"#);
    let names: Vec<_> = package.pages().iter().map(|p| p.part_name()).collect();
    assert_eq!(names, &["Documents/1/Pages/1.fpage", "Documents/1/Pages/2.fpage"]);
    assert!(matches!(
        package.page(2),
        Err(resxps::Error::PageOutOfRange(2))
    ));
}

#[test]
fn empty_page() {
    let (mut package, _) = package_with_page(r#"<FixedPage Width="100" Height="100"/>"#);
    let pixmap = package
        .render_page(1, IntSize::from_wh(51, 66).unwrap())
        .unwrap();
    assert!(pixmap
        .pixels()
        .iter()
        .all(|p| p.demultiply() == resxps::tiny_skia::ColorU8::from_rgba(255, 255, 255, 255)));
}

#[test]
fn red_triangle() {
    let pixmap = render(
        r##"<FixedPage xmlns="http://schemas.microsoft.com/xps/2005/06" Width="100" Height="100">
            <Path Data="M 10,10 L 90,10 L 50,90 Z" Fill="#FF0000"/>
        </FixedPage>"##,
        100,
        100,
    );

    assert_eq!(pixel(&pixmap, 50, 30), RED);
    assert_eq!(pixel(&pixmap, 5, 5), WHITE);
    assert_eq!(pixel(&pixmap, 15, 80), WHITE);
    assert_eq!(pixel(&pixmap, 95, 95), WHITE);
}

#[test]
fn half_page_triangle() {
    let pixmap = render(
        r##"<FixedPage xmlns="http://schemas.microsoft.com/xps/2005/06" Width="100" Height="100">
            <Path Data="M 0,0 L 100,0 L 100,100 Z" Fill="#FF0000"/>
        </FixedPage>"##,
        100,
        100,
    );

    assert_eq!(pixel(&pixmap, 80, 20), RED);
    assert_eq!(pixel(&pixmap, 20, 80), WHITE);
}

#[test]
fn truncated_page() {
    let pixmap = render(
        r##"<FixedPage Width="100" Height="100">
            <Path Data="M 0,0 L 100,0 L 100,100 L 0,100 Z" Fill="#FF0000"/>
            <Path Data="M 0,0 L 10,0"##,
        100,
        100,
    );

    // Everything before the syntax error is painted.
    assert_eq!(pixel(&pixmap, 50, 50), RED);
}

#[test]
fn duplicated_attribute() {
    let pixmap = render(
        r##"<FixedPage Width="100" Height="100">
            <Path Data="M 0,0 L 100,0 L 100,100 L 0,100 Z" Fill="#FF0000" Fill="#00FF00"/>
        </FixedPage>"##,
        100,
        100,
    );

    assert_eq!(pixel(&pixmap, 50, 50), RED);
}

#[test]
fn page_is_scaled_to_target() {
    let pixmap = render(
        r##"<FixedPage Width="100" Height="100">
            <Path Data="M 0,0 H 50 V 50 H 0 Z" Fill="#FF0000"/>
        </FixedPage>"##,
        200,
        300,
    );

    assert_eq!(pixel(&pixmap, 90, 140), RED);
    assert_eq!(pixel(&pixmap, 110, 140), WHITE);
    assert_eq!(pixel(&pixmap, 90, 160), WHITE);
}

#[test]
fn property_element_fill() {
    let pixmap = render(
        r##"<FixedPage Width="100" Height="100">
            <Path Data="M 0,0 L 100,0 L 100,100 L 0,100 Z">
                <Path.Fill>
                    <SolidColorBrush Color="#0000FF"/>
                </Path.Fill>
            </Path>
        </FixedPage>"##,
        100,
        100,
    );

    assert_eq!(pixel(&pixmap, 50, 50), BLUE);
}

#[test]
fn invalid_color_is_not_painted() {
    let pixmap = render(
        r##"<FixedPage Width="100" Height="100">
            <Path Data="M 0,0 L 100,0 L 100,100 L 0,100 Z" Fill="#GG0000"/>
        </FixedPage>"##,
        100,
        100,
    );

    assert_eq!(pixel(&pixmap, 50, 50), WHITE);
}

#[test]
fn stroke() {
    let pixmap = render(
        r##"<FixedPage Width="100" Height="100">
            <Path Data="M 10,50 L 90,50" Stroke="#000000" StrokeThickness="4"/>
        </FixedPage>"##,
        100,
        100,
    );

    assert_eq!(pixel(&pixmap, 50, 50), BLACK);
    assert_eq!(pixel(&pixmap, 50, 40), WHITE);
}

#[test]
fn property_element_stroke() {
    let pixmap = render(
        r##"<FixedPage Width="100" Height="100">
            <Path Data="M 10,50 L 90,50" StrokeThickness="4">
                <Path.Stroke>
                    <SolidColorBrush Color="#0000FF"/>
                </Path.Stroke>
            </Path>
        </FixedPage>"##,
        100,
        100,
    );

    assert_eq!(pixel(&pixmap, 50, 50), BLUE);
    assert_eq!(pixel(&pixmap, 50, 40), WHITE);
}

#[test]
fn canvas_transform() {
    let pixmap = render(
        r##"<FixedPage Width="100" Height="100">
            <Canvas RenderTransform="1,0,0,1,50,0">
                <Path Data="M 0,0 L 10,0 L 10,10 L 0,10 Z" Fill="#FF0000"/>
            </Canvas>
            <Path Data="M 0,90 L 10,90 L 10,100 L 0,100 Z" Fill="#0000FF"/>
        </FixedPage>"##,
        100,
        100,
    );

    assert_eq!(pixel(&pixmap, 55, 5), RED);
    assert_eq!(pixel(&pixmap, 5, 5), WHITE);
    // The canvas transform doesn't leak to siblings.
    assert_eq!(pixel(&pixmap, 5, 95), BLUE);
}

#[test]
fn nested_canvas_transform() {
    let pixmap = render(
        r##"<FixedPage Width="100" Height="100">
            <Canvas>
                <Canvas.RenderTransform>
                    <MatrixTransform Matrix="2,0,0,2,0,0"/>
                </Canvas.RenderTransform>
                <Canvas RenderTransform="1,0,0,1,20,20">
                    <Path Data="M 0,0 L 10,0 L 10,10 L 0,10 Z" Fill="#FF0000"/>
                </Canvas>
            </Canvas>
        </FixedPage>"##,
        100,
        100,
    );

    // (20,20)..(30,30) scaled twice.
    assert_eq!(pixel(&pixmap, 45, 45), RED);
    assert_eq!(pixel(&pixmap, 25, 25), WHITE);
    assert_eq!(pixel(&pixmap, 65, 65), WHITE);
}

#[test]
fn path_transform_is_local() {
    let pixmap = render(
        r##"<FixedPage Width="100" Height="100">
            <Path Data="M 0,0 L 10,0 L 10,10 L 0,10 Z" Fill="#FF0000">
                <Path.RenderTransform>
                    <MatrixTransform Matrix="1,0,0,1,50,50"/>
                </Path.RenderTransform>
            </Path>
            <Path Data="M 0,0 L 10,0 L 10,10 L 0,10 Z" Fill="#0000FF"/>
        </FixedPage>"##,
        100,
        100,
    );

    assert_eq!(pixel(&pixmap, 55, 55), RED);
    assert_eq!(pixel(&pixmap, 5, 5), BLUE);
}

#[test]
fn canvas_opacity() {
    let pixmap = render(
        r##"<FixedPage Width="100" Height="100">
            <Canvas Opacity="0.5">
                <Path Data="M 0,0 L 100,0 L 100,100 L 0,100 Z" Fill="#FF0000"/>
            </Canvas>
        </FixedPage>"##,
        100,
        100,
    );

    let (r, g, b, a) = pixel(&pixmap, 50, 50);
    assert_eq!((r, a), (255, 255));
    assert!((120..=136).contains(&g), "{}", g);
    assert_eq!(g, b);
}

#[test]
fn canvas_opacity_is_restored() {
    let pixmap = render(
        r##"<FixedPage Width="100" Height="100">
            <Canvas Opacity="0.5">
                <Path Data="M 0,0 L 50,0 L 50,100 L 0,100 Z" Fill="#FF0000"/>
            </Canvas>
            <Path Data="M 50,0 L 100,0 L 100,100 L 50,100 Z" Fill="#FF0000"/>
        </FixedPage>"##,
        100,
        100,
    );

    assert_ne!(pixel(&pixmap, 25, 50), RED);
    assert_eq!(pixel(&pixmap, 75, 50), RED);
}

/// Builds a package with a single page and a `Resources/Image.png` part.
fn image_package(markup: &str, png: Vec<u8>) -> resxps::Package {
    let archive = resxps::MemoryArchive::new()
        .with("_rels/.rels", r#"<Relationships><Relationship Type="http://schemas.microsoft.com/xps/2005/06/fixedrepresentation" Target="/Seq.fdseq"/></Relationships>"#)
        .with("Seq.fdseq", r#"<FixedDocumentSequence><DocumentReference Source="Documents/1/Doc.fdoc"/></FixedDocumentSequence>"#)
        .with("Documents/1/Doc.fdoc", r#"<FixedDocument><PageContent Source="Pages/1.fpage"/></FixedDocument>"#)
        .with("Documents/1/Pages/1.fpage", markup)
        .with("Resources/Image.png", png);

    resxps::Package::open(Box::new(archive), crate::FakeFonts::default()).unwrap()
}

/// A 2x1 image: a red pixel followed by a blue one.
fn red_blue_png() -> Vec<u8> {
    use resxps::tiny_skia::PremultipliedColorU8;

    let mut image = resxps::tiny_skia::Pixmap::new(2, 1).unwrap();
    image.pixels_mut()[0] = PremultipliedColorU8::from_rgba(255, 0, 0, 255).unwrap();
    image.pixels_mut()[1] = PremultipliedColorU8::from_rgba(0, 0, 255, 255).unwrap();
    image.encode_png().unwrap()
}

fn is_red(c: (u8, u8, u8, u8)) -> bool {
    c.0 > 180 && c.2 < 80
}

fn is_blue(c: (u8, u8, u8, u8)) -> bool {
    c.2 > 180 && c.0 < 80
}

fn render_image_brush(brush: &str, png: Vec<u8>) -> resxps::tiny_skia::Pixmap {
    let markup = format!(
        r##"<FixedPage Width="100" Height="100">
            <Path Data="M 0,0 L 100,0 L 100,100 L 0,100 Z">
                <Path.Fill>{}</Path.Fill>
            </Path>
        </FixedPage>"##,
        brush
    );

    let mut package = image_package(&markup, png);
    package
        .render_page(0, IntSize::from_wh(100, 100).unwrap())
        .unwrap()
}

#[test]
fn image_brush_transform_attribute() {
    let pixmap = render_image_brush(
        r#"<ImageBrush ImageSource="/Resources/Image.png" Viewbox="0,0,2,1"
            Viewport="0,0,40,20" Transform="1,0,0,1,10,0"/>"#,
        red_blue_png(),
    );

    // Red is at 10..30, blue at 30..50, repeated every 40 units.
    assert!(is_red(pixel(&pixmap, 20, 10)));
    assert!(is_blue(pixel(&pixmap, 40, 10)));
    assert!(is_red(pixel(&pixmap, 60, 50)));
    assert!(is_blue(pixel(&pixmap, 80, 50)));
    assert!(is_blue(pixel(&pixmap, 4, 10)));
}

#[test]
fn image_brush_transform_element() {
    let pixmap = render_image_brush(
        r#"<ImageBrush ImageSource="/Resources/Image.png" Viewbox="0,0,2,1" Viewport="10,0,40,20">
            <ImageBrush.Transform>
                <MatrixTransform Matrix="1,0,0,1,10,0"/>
            </ImageBrush.Transform>
        </ImageBrush>"#,
        red_blue_png(),
    );

    // Red is at 20..40, blue at 40..60, repeated every 40 units.
    assert!(is_red(pixel(&pixmap, 30, 10)));
    assert!(is_blue(pixel(&pixmap, 50, 10)));
    assert!(is_red(pixel(&pixmap, 70, 10)));
    assert!(is_blue(pixel(&pixmap, 10, 10)));
}

#[cfg(feature = "raster-images")]
#[test]
fn image_brush_dpi() {
    // A 4x1 image at 192 DPI: two red pixels followed by two blue ones.
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, 4, 1);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: 7559,
            yppu: 7559,
            unit: png::Unit::Meter,
        }));
        let mut writer = encoder.write_header().unwrap();
        writer
            .write_image_data(&[255, 0, 0, 255, 0, 0, 0, 0, 255, 0, 0, 255])
            .unwrap();
    }

    // At 192 DPI the whole image is 2x0.5 units, so the viewbox covers both colors.
    let pixmap = render_image_brush(
        r#"<ImageBrush ImageSource="/Resources/Image.png" Viewbox="0,0,2,1" Viewport="0,0,40,20"/>"#,
        png_data,
    );

    assert!(is_red(pixel(&pixmap, 10, 5)));
    assert!(is_blue(pixel(&pixmap, 30, 5)));
}

#[test]
fn image_brush() {
    let mut image = resxps::tiny_skia::Pixmap::new(2, 2).unwrap();
    image.fill(resxps::tiny_skia::Color::from_rgba8(0, 255, 0, 255));
    let png = image.encode_png().unwrap();

    let markup = r##"<FixedPage Width="100" Height="100">
        <Path Data="M 0,0 L 100,0 L 100,100 L 0,100 Z">
            <Path.Fill>
                <ImageBrush ImageSource="../../../Resources/Image.png"
                    Viewbox="0,0,2,2" ViewboxUnits="Absolute"
                    Viewport="0,0,50,50" ViewportUnits="Absolute"
                    TileMode="Tile"/>
            </Path.Fill>
        </Path>
    </FixedPage>"##;

    let mut package = image_package(markup, png);
    let pixmap = package
        .render_page(0, IntSize::from_wh(100, 100).unwrap())
        .unwrap();

    let (r, g, b, _) = pixel(&pixmap, 25, 25);
    assert!(r < 30 && g > 220 && b < 30, "{:?}", (r, g, b));
    // Tiled.
    let (r, g, b, _) = pixel(&pixmap, 75, 75);
    assert!(r < 30 && g > 220 && b < 30, "{:?}", (r, g, b));
}

#[test]
fn glyphs() {
    let pixmap = render(
        r##"<FixedPage Width="200" Height="100">
            <Glyphs FontUri="/Resources/Font.ttf" FontRenderingEmSize="20"
                OriginX="10" OriginY="50" UnicodeString="AB" Fill="#000000"/>
        </FixedPage>"##,
        200,
        100,
    );

    // Each glyph is a 10x14 box sitting on the baseline.
    assert_eq!(pixel(&pixmap, 15, 45), BLACK);
    assert_eq!(pixel(&pixmap, 25, 45), BLACK);
    assert_eq!(pixel(&pixmap, 35, 45), WHITE);
    assert_eq!(pixel(&pixmap, 15, 30), WHITE);
    assert_eq!(pixel(&pixmap, 15, 55), WHITE);
}

#[test]
fn obfuscated_font() {
    let markup = format!(
        r##"<FixedPage Width="200" Height="100">
            <Glyphs FontUri="/Resources/{}.odttf" FontRenderingEmSize="20"
                OriginX="10" OriginY="50" UnicodeString="A" Fill="#000000"/>
        </FixedPage>"##,
        FONT_GUID
    );

    let (mut package, loads) = package_with_page(&markup);
    let pixmap = package
        .render_page(0, IntSize::from_wh(200, 100).unwrap())
        .unwrap();

    assert_eq!(pixel(&pixmap, 15, 45), BLACK);
    // A plain attempt and a de-obfuscated one.
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[test]
fn font_is_loaded_once() {
    let (mut package, loads) = package_with_page(
        r##"<FixedPage Width="200" Height="100">
            <Glyphs FontUri="/Resources/Font.ttf" FontRenderingEmSize="20"
                OriginX="10" OriginY="30" UnicodeString="A" Fill="#000000"/>
            <Glyphs FontUri="../../../Resources/Font.ttf" FontRenderingEmSize="40"
                OriginX="10" OriginY="90" UnicodeString="B" Fill="#000000"/>
        </FixedPage>"##,
    );

    let size = IntSize::from_wh(200, 100).unwrap();
    let pixmap = package.render_page(0, size).unwrap();
    assert_eq!(pixel(&pixmap, 15, 25), BLACK);
    assert_eq!(pixel(&pixmap, 25, 80), BLACK);

    package.render_page(0, IntSize::from_wh(100, 50).unwrap()).unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(
        package.fonts().families(),
        vec![("Resources/Font.ttf".to_string(), Some("Fake".to_string()))]
    );
}

#[test]
fn missing_font() {
    let (mut package, _) = package_with_page(
        r##"<FixedPage Width="100" Height="100">
            <Glyphs FontUri="/Resources/Missing.ttf" FontRenderingEmSize="20"
                OriginX="10" OriginY="50" UnicodeString="A" Fill="#000000"/>
            <Path Data="M 50,50 L 60,50 L 60,60 Z" Fill="#FF0000"/>
        </FixedPage>"##,
    );

    let pixmap = package
        .render_page(0, IntSize::from_wh(100, 100).unwrap())
        .unwrap();
    assert_eq!(pixel(&pixmap, 15, 45), WHITE);
    // Rendering continues after the failed run.
    assert_eq!(pixel(&pixmap, 58, 52), RED);
}

#[test]
fn cached_render() {
    let (mut package, _) = package_with_page(
        r##"<FixedPage Width="100" Height="100">
            <Path Data="M 10,10 L 90,10 L 50,90 Z" Fill="#FF0000"/>
        </FixedPage>"##,
    );

    let size = IntSize::from_wh(64, 64).unwrap();
    let a = package.render_page(0, size).unwrap();
    let b = package.render_page(0, size).unwrap();
    assert_eq!(a.data(), b.data());

    package.set_options(resxps::Options {
        background: resxps::tiny_skia::Color::BLACK,
        ..resxps::Options::default()
    });
    let c = package.render_page(0, size).unwrap();
    assert_eq!(pixel(&c, 2, 2), BLACK);
}
