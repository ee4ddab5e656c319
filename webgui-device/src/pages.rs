//! Web pages compiled into the firmware image

use webgui_rs::template::StaticFs;

/// Build the read-only file system served by the portal
pub fn embedded_pages() -> StaticFs {
    StaticFs::new()
        .with_file("/index.html", include_bytes!("../pages/index.html"))
        .with_file("/set_sys.html", include_bytes!("../pages/set_sys.html"))
        .with_file("/set_wifi.html", include_bytes!("../pages/set_wifi.html"))
        .with_file("/set_mqtt.html", include_bytes!("../pages/set_mqtt.html"))
        .with_file("/reboot.html", include_bytes!("../pages/reboot.html"))
        .with_file("/parts/header.html", include_bytes!("../pages/parts/header.html"))
        .with_file("/style.css", include_bytes!("../pages/style.css"))
}
