use embuild::espidf::sysenv;

fn main() {
    sysenv::output();
}
