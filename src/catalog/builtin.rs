// (id, label) in canonical display order.
pub(super) const PAGES: &[(&str, &str)] = &[
    ("about", "About"),
    ("accessibility", "Accessibility"),
    ("apps", "Apps"),
    ("bookmarks", "Bookmarks"),
    ("components", "Components"),
    ("crashes", "Crashes"),
    ("credits", "Credits"),
    ("device-log", "Device Log"),
    ("discards", "Discards"),
    ("download-internals", "Download Internals"),
    ("downloads", "Downloads"),
    ("extensions", "Extensions"),
    ("flags", "Flags"),
    ("gcm-internals", "GCM Internals"),
    ("gpu", "GPU"),
    ("help", "Help"),
    ("histograms", "Histograms"),
    ("history", "History"),
    ("indexeddb-internals", "IndexedDB Internals"),
    ("inspect", "Inspect"),
    ("interstitials", "Interstitials"),
    ("local-state", "Local State"),
    ("management", "Management"),
    ("media-engagement", "Media Engagement"),
    ("media-internals", "Media Internals"),
    ("net-export", "Net Export"),
    ("net-internals", "Net Internals"),
    ("network-errors", "Network Errors"),
    ("newtab", "New Tab"),
    ("omnibox", "Omnibox"),
    ("password-manager-internals", "Password Manager Internals"),
    ("policy", "Policy"),
    ("predictors", "Predictors"),
    ("print", "Print"),
    ("process-internals", "Process Internals"),
    ("quota-internals", "Quota Internals"),
    ("safe-browsing", "Safe Browsing"),
    ("serviceworker-internals", "Service Worker Internals"),
    ("settings", "Settings"),
    ("signin-internals", "Sign-in Internals"),
    ("site-engagement", "Site Engagement"),
    ("sync-internals", "Sync Internals"),
    ("system", "System"),
    ("terms", "Terms"),
    ("tracing", "Tracing"),
    ("translate-internals", "Translate Internals"),
    ("usb-internals", "USB Internals"),
    ("user-actions", "User Actions"),
    ("version", "Version"),
    ("webrtc-internals", "WebRTC Internals"),
    ("webrtc-logs", "WebRTC Logs"),
];
