//! Fixed text inserted into rewritten upstream scripts

/// Missing-import branch of the cj3 runtime loader, as shipped upstream
pub const CJ3_MISSING_IMPORT: &str = r#"if(h===undefined){console.log("Missing import:",c);V();;}"#;

/// Looser form of [`CJ3_MISSING_IMPORT`] tolerating a dropped empty statement
pub const CJ3_MISSING_IMPORT_PATTERN: &str =
    r#"if\(h===undefined\)\{console\.log\("Missing import:",c\);V\(\);;?\}"#;

/// Replacement branch: provides `__syscall_pipe2` and `JVM_LoadLibrary` before
/// falling back to the original missing-import handling
pub const CJ3_IMPORT_SHIM: &str = concat!(
    r#"if(h===undefined){if(c==="__syscall_pipe2"){h=$.a24[c]=function(fds,flags){var g;"#,
    r#"try{g=(typeof globalThis!=="undefined")?globalThis:self;}catch(e){g=self;}"#,
    r#"try{var p=g&&g.__syscall_pipe;if(typeof p==="function")return p(fds);}catch(e){}"#,
    r#"try{(g.console||console).warn("[cj3.js] shim __syscall_pipe2");}catch(e){}return -38;};}"#,
    r#"else if(c==="JVM_LoadLibrary"){h=$.a24[c]=function(){try{(console||{}).log&&"#,
    r#"console.log("[cj3.js] stub JVM_LoadLibrary");}catch(e){}return 1;};}"#,
    r#"else{console.log("Missing import:",c);V();;}}"#,
);

/// Monotonic `performance.now()` / `Date.now()` initialisation block
pub const MONOTONIC_TIMER_SNIPPET: &str = r#"
;(function(){
  try {
    var _realNow = performance.now.bind(performance);
    var _lastNow = _realNow();
    Object.defineProperty(performance, 'now', {
      value: function() {
        var now = _realNow();
        if (now <= _lastNow) { now = _lastNow + 0.01; }
        _lastNow = now;
        return now;
      },
      writable: true, configurable: true
    });

    var _realDateNow = Date.now.bind(Date);
    var _lastDateNow = _realDateNow();
    Date.now = function() {
      var now = _realDateNow();
      if (now <= _lastDateNow) { now = _lastDateNow + 1; }
      _lastDateNow = now;
      return now;
    };

    console.log("[shimserve] monotonic timer installed");
  } catch(e) { console.error("[shimserve] monotonic timer failed", e); }
})();
"#;
