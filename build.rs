// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

// Common Controls v6 (tab control visuals) + per-monitor DPI awareness.
const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<assembly xmlns="urn:schemas-microsoft-com:asm.v1" manifestVersion="1.0">
  <dependency>
    <dependentAssembly>
      <assemblyIdentity type="win32" name="Microsoft.Windows.Common-Controls"
        version="6.0.0.0" processorArchitecture="*"
        publicKeyToken="6595b64144ccf1df" language="*"/>
    </dependentAssembly>
  </dependency>
  <application xmlns="urn:schemas-microsoft-com:asm.v3">
    <windowsSettings>
      <dpiAwareness xmlns="http://schemas.microsoft.com/SMI/2016/WindowsSettings">PerMonitorV2</dpiAwareness>
    </windowsSettings>
  </application>
</assembly>
"#;

fn main() {
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }
    let mut res = winresource::WindowsResource::new();
    res.set("ProductName", "VBoxTabs Manager");
    res.set("FileDescription", "VirtualBox windows as tabs");
    res.set_manifest(MANIFEST);
    if let Err(e) = res.compile() {
        println!("cargo:warning=winresource: {e}");
    }
}
