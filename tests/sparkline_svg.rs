use sauna_mirage::{ColorRamp, SparklineConfig, SparklineGeometry};

fn paths(group: &usvg::Group) -> Vec<&usvg::Path> {
    let mut out = Vec::new();
    for node in group.children() {
        match node {
            usvg::Node::Group(g) => out.extend(paths(g.as_ref())),
            usvg::Node::Path(p) => out.push(p.as_ref()),
            _ => {}
        }
    }
    out
}

#[test]
fn svg_document_holds_area_then_line() {
    let config = SparklineConfig::default();
    let theme = ColorRamp::default().theme_for(110.0);
    let geometry = SparklineGeometry::build(&[10.0, 20.0, 15.0, 30.0, 25.0], &config).unwrap();
    let svg = geometry.to_svg(&theme, &config);

    let tree = usvg::Tree::from_str(&svg, &usvg::Options::default()).unwrap();
    assert_eq!(tree.size().width(), 600.0);
    assert_eq!(tree.size().height(), 40.0);

    let found = paths(tree.root());
    assert_eq!(found.len(), 2);

    let area = found[0];
    assert!(area.stroke().is_none());
    let usvg::Paint::Color(fill) = area.fill().unwrap().paint() else {
        panic!("area fill should be a flat color");
    };
    assert_eq!(
        (fill.red, fill.green, fill.blue),
        (theme.stroke.r, theme.stroke.g, theme.stroke.b)
    );

    let line = found[1];
    assert!(line.fill().is_none());
    let stroke = line.stroke().unwrap();
    assert_eq!(stroke.width().get(), 6.0);
    let usvg::Paint::Color(color) = stroke.paint() else {
        panic!("line stroke should be a flat color");
    };
    assert_eq!(
        (color.red, color.green, color.blue),
        (theme.text.r, theme.text.g, theme.text.b)
    );
}

#[test]
fn area_reaches_the_baseline() {
    let config = SparklineConfig::default();
    let geometry = SparklineGeometry::build(&[50.0, 70.0, 60.0], &config).unwrap();
    let svg = geometry.to_svg(&ColorRamp::default().theme_for(80.0), &config);
    let tree = usvg::Tree::from_str(&svg, &usvg::Options::default()).unwrap();

    let area = paths(tree.root())[0];
    let bounds = area.data().bounds();
    assert_eq!(bounds.bottom(), 40.0);
    assert_eq!(bounds.left(), 0.0);
    assert_eq!(bounds.right(), 600.0);
}
