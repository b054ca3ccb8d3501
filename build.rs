fn main() {
    // Only the device build needs the ESP-IDF environment; host builds
    // (simulator, tests) have nothing to generate.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
