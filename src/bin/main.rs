fn main() {
    shaft::main();
}
