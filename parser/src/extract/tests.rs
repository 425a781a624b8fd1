use super::*;
use crate::dt::parse_dt;

fn init_log() {
    use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
    use std::sync::OnceLock;
    static LOG_INIT: OnceLock<()> = OnceLock::new();
    LOG_INIT.get_or_init(|| {
        // Note: raise the level to see define-substitution logs in tests.
        let _ = TermLogger::init(
            LevelFilter::Error,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::AlwaysAnsi,
        );
    });
}

fn extract(src: &str) -> ExtractionResult {
    init_log();
    let (roots, errors) = parse_dt(src);
    assert!(
        errors.iter().all(|e| !e.is_error()),
        "parse errors: {errors:?}"
    );
    let defines = harvest_defines(&roots);
    extract_layout(&roots, src, &defines)
}

#[test]
fn minimal_keymap() {
    let result = extract(
        r#"/ { keymap { compatible = "zmk,keymap";
  default_layer { bindings = <&kp Q &kp W &kp E>; };
}; };"#,
    );
    assert!(result.diagnostics.is_empty());
    let layout = result.layout;
    assert_eq!(layout.layer_names, vec!["default_layer"]);
    assert_eq!(layout.layers.len(), 1);
    let layer = &layout.layers[0];
    assert_eq!(layer.len(), 3);
    for (binding, param) in layer.iter().zip(["Q", "W", "E"]) {
        assert_eq!(binding.behavior, "&kp");
        assert_eq!(binding.params[0].value.as_str(), Some(param));
    }
}

#[test]
fn missing_keymap_is_an_error() {
    let result = extract("/ { };");
    assert!(result.diagnostics.iter().any(|d| d.is_error()));
    assert!(result.layout.layer_names.is_empty());
}

#[test]
fn layer_order_matches_declaration() {
    let result = extract(
        r#"/ { keymap { compatible = "zmk,keymap";
  base { bindings = <&kp A>; };
  nav { bindings = <&trans>; };
  sym { bindings = <&none>; };
}; };"#,
    );
    assert_eq!(result.layout.layer_names, vec!["base", "nav", "sym"]);
}

#[test]
fn hold_tap_extraction() {
    let result = extract(
        r#"/ { behaviors {
  hm: homerow_mods {
    compatible = "zmk,behavior-hold-tap";
    flavor = "tap-preferred";
    tapping-term-ms = <280>;
    quick-tap-ms = <175>;
    bindings = <&kp>, <&kp>;
  };
}; keymap { compatible = "zmk,keymap"; base { bindings = <&hm LSHIFT A>; }; }; };"#,
    );
    let ht = &result.layout.hold_taps[0];
    assert_eq!(ht.name, "hm");
    assert_eq!(ht.bindings, vec!["&kp", "&kp"]);
    assert_eq!(ht.tapping_term_ms, Some(280));
    assert_eq!(ht.quick_tap_ms, Some(175));
    assert_eq!(ht.flavor.as_deref(), Some("tap-preferred"));
}

#[test]
fn hold_tap_flags_and_positions() {
    let result = extract(
        r#"/ { behaviors {
  hrm: hrm {
    compatible = "zmk,behavior-hold-tap";
    bindings = <&kp>, <&kp>;
    hold-trigger-key-positions = <5 6 7>;
    hold-trigger-on-release;
    retro-tap;
  };
}; keymap { compatible = "zmk,keymap"; base { bindings = <&trans>; }; }; };"#,
    );
    let ht = &result.layout.hold_taps[0];
    assert_eq!(ht.hold_trigger_key_positions, Some(vec![5, 6, 7]));
    assert_eq!(ht.hold_trigger_on_release, Some(true));
    assert_eq!(ht.retro_tap, Some(true));
}

#[test]
fn combo_extraction() {
    let result = extract(
        r#"/ { combos {
  compatible = "zmk,combos";
  esc_combo {
    timeout-ms = <50>;
    key-positions = <0 1>;
    bindings = <&kp ESC>;
    layers = <0 2>;
  };
}; keymap { compatible = "zmk,keymap"; base { bindings = <&trans>; }; }; };"#,
    );
    let combo = &result.layout.combos[0];
    assert_eq!(combo.name, "esc_combo");
    assert_eq!(combo.key_positions, vec![0, 1]);
    assert_eq!(combo.binding.to_str(), "&kp ESC");
    assert_eq!(combo.timeout_ms, Some(50));
    assert_eq!(combo.layers, Some(vec![0, 2]));
}

#[test]
fn macro_extraction_splits_binding_stream() {
    let result = extract(
        r#"/ { macros {
  email: email {
    compatible = "zmk,behavior-macro";
    wait-ms = <40>;
    tap-ms = <30>;
    bindings = <&kp E &kp M &kp A>;
  };
}; keymap { compatible = "zmk,keymap"; base { bindings = <&email>; }; }; };"#,
    );
    let mac = &result.layout.macros[0];
    assert_eq!(mac.name, "email");
    assert_eq!(mac.bindings.len(), 3);
    assert_eq!(mac.wait_ms, Some(40));
    assert_eq!(mac.tap_ms, Some(30));
}

#[test]
fn macro_without_compatible_under_macros_parent() {
    let result = extract(
        r#"/ { macros {
  greet: greet { bindings = <&kp H &kp I>; };
}; keymap { compatible = "zmk,keymap"; base { bindings = <&greet>; }; }; };"#,
    );
    assert_eq!(result.layout.macros.len(), 1);
    assert_eq!(result.layout.macros[0].name, "greet");
}

#[test]
fn tap_dance_extraction() {
    let result = extract(
        r#"/ { behaviors {
  td_q: tap_dance_q {
    compatible = "zmk,behavior-tap-dance";
    tapping-term-ms = <200>;
    bindings = <&kp Q>, <&kp LC(Q)>;
  };
}; keymap { compatible = "zmk,keymap"; base { bindings = <&td_q>; }; }; };"#,
    );
    let td = &result.layout.tap_dances[0];
    assert_eq!(td.name, "td_q");
    assert_eq!(td.bindings.len(), 2);
    assert_eq!(td.bindings[1].to_str(), "&kp LC(Q)");
}

#[test]
fn defines_substituted_in_bindings() {
    let result = extract(
        r#"#define THUMB_MOD LGUI
/ { keymap { compatible = "zmk,keymap";
  base { bindings = <&kp THUMB_MOD &kp A>; };
}; };"#,
    );
    assert_eq!(result.layout.layers[0][0].to_str(), "&kp LGUI");
}

#[test]
fn harvest_defines_collects_all_scopes() {
    let (roots, _) = parse_dt(
        "#define A 1\n/ {\n#define B two\nkeymap { compatible = \"zmk,keymap\"; };\n};",
    );
    let defines = harvest_defines(&roots);
    assert_eq!(defines.get("A").map(String::as_str), Some("1"));
    assert_eq!(defines.get("B").map(String::as_str), Some("two"));
}

#[test]
fn input_listener_from_bare_reference() {
    let result = extract(
        r#"/ { keymap { compatible = "zmk,keymap"; base { bindings = <&trans>; }; }; };
&trackball_input_listener {
  scroll {
    layers = <2>;
    input-processors = <&zip_xy_scaler 2 1>;
  };
};"#,
    );
    let listener = &result.layout.input_listeners[0];
    assert_eq!(listener.code, "&trackball_input_listener");
    assert_eq!(listener.nodes.len(), 1);
    assert_eq!(listener.nodes[0].code, "scroll");
    assert_eq!(listener.nodes[0].layers, vec![2]);
    assert_eq!(
        listener.nodes[0].input_processors[0].to_str(),
        "&zip_xy_scaler 2 1"
    );
}

#[test]
fn unknown_compatible_preserved_as_custom_devicetree() {
    let src = r#"/ {
  keymap { compatible = "zmk,keymap"; base { bindings = <&trans>; }; };
  oled: oled_display { compatible = "solomon,ssd1306"; width = <128>; };
};"#;
    let result = extract(src);
    let custom = &result.layout.custom_devicetree;
    assert!(custom.contains("solomon,ssd1306"));
    assert!(custom.contains("width = <128>"));
    assert!(custom.starts_with("/ {"));
}

#[test]
fn untyped_behavior_preserved_as_custom_behaviors() {
    let src = r#"/ {
  behaviors {
    hm: hm { compatible = "zmk,behavior-hold-tap"; bindings = <&kp>, <&kp>; };
    smart_shift: smart_shift {
      compatible = "zmk,behavior-mod-morph";
      bindings = <&kp LSHIFT>, <&caps_word>;
    };
  };
  keymap { compatible = "zmk,keymap"; base { bindings = <&smart_shift>; }; };
};"#;
    let result = extract(src);
    assert_eq!(result.layout.hold_taps.len(), 1);
    let custom = &result.layout.custom_defined_behaviors;
    assert!(custom.contains("zmk,behavior-mod-morph"));
    assert!(custom.contains("behaviors {"));
    assert!(!custom.contains("zmk,behavior-hold-tap"));
}

#[test]
fn malformed_layer_keeps_placeholder_length() {
    let result = extract(
        r#"/ { keymap { compatible = "zmk,keymap";
  base { bindings = <&kp A Q &kp B>; };
}; };"#,
    );
    // 'Q' binds to the preceding &kp A as an extra param; counts stay sane.
    assert_eq!(result.layout.layers[0].len(), 2);
}
