fn main() {
    sfm_cloud::cli::run();
}
